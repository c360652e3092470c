//! # Placebook Gateway
//!
//! HTTP server for the booking API: credential service, interceptor chains
//! for authentication and authorization, resource handlers, and image storage.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Authentication and authorization.
pub mod auth;
/// Uploaded image storage.
pub mod blob;
/// API error taxonomy.
pub mod error;
mod handlers;
mod middleware;
mod server;

pub use auth::{AuthConfig, AuthError, Claims, Identity, JwtManager};
pub use blob::{BlobError, BlobStore, LocalBlobStore};
pub use error::ApiError;
pub use middleware::AuthRateLimiter;
pub use server::{Gateway, GatewayBuilder, GatewayConfig, GatewayState};

/// Start the gateway server.
///
/// # Errors
///
/// Returns error if server fails to start.
pub async fn start(config: GatewayConfig) -> Result<(), GatewayError> {
    let gateway = Gateway::new(config)?;
    gateway.run().await
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Storage could not be opened or bootstrapped.
    #[error("Storage error: {0}")]
    Storage(#[from] placebook_core::StoreError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
