//! Gateway server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn_with_state, map_response},
    routing::{get, post},
};
use placebook_core::{Config, Persistence, SledStore};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::GatewayError;
use crate::auth::middleware::enforce;
use crate::auth::{
    AuthConfig, InterceptorChain, JwtManager, decoy_hash, setup::auto_setup_from_env,
};
use crate::blob::{BlobStore, LocalBlobStore};
use crate::handlers::{self, bookings, places, users};
use crate::middleware::AuthRateLimiter;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Port to listen on.
    pub port: u16,
    /// Bind address.
    pub bind_address: String,
    /// Enable CORS.
    pub cors: bool,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Largest accepted request body.
    pub max_upload_bytes: usize,
    /// Login/register attempts per client per minute.
    pub auth_requests_per_minute: u32,
    /// Database directory.
    pub data_dir: PathBuf,
    /// Uploaded image directory.
    pub uploads_dir: PathBuf,
    /// Authentication configuration.
    pub auth: AuthConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for GatewayConfig {
    fn from(config: &Config) -> Self {
        Self {
            port: config.gateway.port,
            bind_address: config.gateway.bind_address.clone(),
            cors: config.gateway.cors,
            timeout_secs: config.gateway.timeout_secs,
            max_upload_bytes: config.gateway.max_upload_bytes,
            auth_requests_per_minute: config.gateway.auth_requests_per_minute,
            data_dir: config.storage.data_dir(),
            uploads_dir: config.storage.uploads_dir(),
            auth: AuthConfig::from(&config.auth),
        }
    }
}

/// Gateway server state shared across handlers.
///
/// Built once at startup and never mutated afterwards.
pub struct GatewayState {
    /// Persistence gateway.
    pub store: Arc<dyn Persistence>,
    /// Image storage.
    pub blobs: Arc<dyn BlobStore>,
    /// Token issuer and validator.
    pub jwt: Arc<JwtManager>,
    /// Credential endpoint throttle.
    pub limiter: Arc<AuthRateLimiter>,
    /// Password hash verified against when a login names no known account.
    pub decoy_hash: String,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

/// Gateway server.
pub struct Gateway {
    config: GatewayConfig,
    state: Arc<GatewayState>,
}

/// Builder for constructing a Gateway with its dependencies.
pub struct GatewayBuilder {
    config: GatewayConfig,
    store: Option<Arc<dyn Persistence>>,
    blobs: Option<Arc<dyn BlobStore>>,
    bootstrap_from_env: bool,
}

impl GatewayBuilder {
    /// Create a new builder with default config.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
            store: None,
            blobs: None,
            bootstrap_from_env: true,
        }
    }

    /// Set gateway configuration.
    #[must_use]
    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this store instead of opening one under `data_dir`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn Persistence>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use this blob store instead of one under `uploads_dir`.
    #[must_use]
    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// Skip the `PLACEBOOK_ADMIN_*` bootstrap.
    #[must_use]
    pub const fn without_env_bootstrap(mut self) -> Self {
        self.bootstrap_from_env = false;
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// Returns error if the signing secret is missing or invalid, or storage
    /// cannot be opened.
    pub fn build(self) -> Result<Gateway, GatewayError> {
        let jwt = Arc::new(
            self.config
                .auth
                .jwt_manager()
                .map_err(|e| GatewayError::Config(format!("Auth init failed: {e}")))?,
        );

        let store: Arc<dyn Persistence> = match self.store {
            Some(store) => store,
            None => Arc::new(SledStore::open(&self.config.data_dir)?),
        };

        let blobs: Arc<dyn BlobStore> = match self.blobs {
            Some(blobs) => blobs,
            None => Arc::new(LocalBlobStore::open(&self.config.uploads_dir).map_err(|e| {
                GatewayError::Config(format!("Failed to open uploads dir: {e}"))
            })?),
        };

        if self.bootstrap_from_env {
            if let Err(e) = auto_setup_from_env(store.as_ref()) {
                tracing::warn!("Auto-setup from env failed: {}", e);
            }
        }

        let decoy_hash = decoy_hash()
            .map_err(|e| GatewayError::Config(format!("Auth init failed: {e}")))?;

        let state = GatewayState {
            store,
            blobs,
            jwt,
            limiter: Arc::new(AuthRateLimiter::new(self.config.auth_requests_per_minute)),
            decoy_hash,
            config: self.config.clone(),
        };

        Ok(Gateway {
            config: self.config,
            state: Arc::new(state),
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Gateway {
    /// Create a gateway with its default store and blob store.
    ///
    /// # Errors
    ///
    /// Returns error if auth or storage initialization fails.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        GatewayBuilder::new().with_config(config).build()
    }

    /// Shared handler state.
    #[must_use]
    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    /// Build the HTTP router.
    ///
    /// Routes are grouped by interceptor chain: public (throttled),
    /// authenticated, and admin.
    pub fn router(&self) -> Router {
        let state = self.state.clone();
        let jwt = state.jwt.clone();

        let public = Router::new()
            .route("/register", post(users::register))
            .route("/login", post(users::login))
            .route_layer(from_fn_with_state(
                InterceptorChain::public(state.limiter.clone()),
                enforce,
            ));

        let authenticated = Router::new()
            .route("/profile", get(users::profile))
            .route("/places", get(places::list_places))
            .route("/places/{id}", get(places::get_place).put(places::update_place))
            .route("/places/{id}/bookings", get(bookings::list_bookings))
            .route("/bookings", post(bookings::create_booking))
            .route_layer(from_fn_with_state(
                InterceptorChain::authenticated(jwt.clone()),
                enforce,
            ));

        let admin = Router::new()
            .route("/places", post(places::create_place))
            .route("/make-admin", post(users::make_admin))
            .route("/users", get(users::list_users))
            .route_layer(from_fn_with_state(InterceptorChain::admin(jwt), enforce));

        let app = Router::new()
            .route("/health", get(handlers::health))
            .merge(public)
            .merge(authenticated)
            .merge(admin)
            .method_not_allowed_fallback(handlers::method_not_allowed)
            .fallback(handlers::fallback)
            .layer(DefaultBodyLimit::max(self.config.max_upload_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.timeout_secs)))
            .layer(map_response(handlers::timeout_as_json))
            .with_state(state);

        let app = if self.config.cors {
            app.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
        } else {
            app
        };

        app.layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns error if the address is invalid, cannot be bound, or the server fails.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| GatewayError::Config(format!("Invalid address: {e}")))?;

        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns error if the server fails.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GatewayError> {
        let addr = listener.local_addr()?;
        tracing::info!("Gateway API listening on http://{}", addr);

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GatewayError::Server(e.to_string()))?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
