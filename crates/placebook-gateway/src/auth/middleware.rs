//! Request interceptors.
//!
//! Each route carries an explicit, ordered [`InterceptorChain`]. Every
//! interceptor either lets the request continue (possibly after adding to the
//! [`RequestContext`]) or short-circuits it with an [`ApiError`]. The first
//! rejection wins and nothing after it runs, including the handler.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::jwt::JwtManager;
use super::{AuthError, Identity};
use crate::error::ApiError;
use crate::middleware::{AuthRateLimiter, RateLimit};

/// Per-request state built up by interceptors.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Set by [`Authenticate`].
    pub identity: Option<Identity>,
}

/// One stage of request admission.
pub trait Interceptor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Inspect the request and either continue (`Ok`) or reject (`Err`).
    ///
    /// # Errors
    ///
    /// Returns the response error that ends the request.
    fn intercept(&self, parts: &Parts, ctx: &mut RequestContext) -> Result<(), ApiError>;
}

/// Validates the bearer token and records the caller's identity.
#[derive(Debug, Clone)]
pub struct Authenticate {
    jwt: Arc<JwtManager>,
}

impl Authenticate {
    /// Authenticate against the given token manager.
    #[must_use]
    pub const fn new(jwt: Arc<JwtManager>) -> Self {
        Self { jwt }
    }
}

impl Interceptor for Authenticate {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    fn intercept(&self, parts: &Parts, ctx: &mut RequestContext) -> Result<(), ApiError> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(JwtManager::extract_from_header)
            .ok_or(AuthError::MissingCredentials)?;

        let claims = self.jwt.validate(token).inspect_err(|e| {
            tracing::debug!(error = %e, path = %parts.uri.path(), "Token rejected");
        })?;

        ctx.identity = Some(claims.identity()?);
        Ok(())
    }
}

/// Admits only callers whose role claim is `admin`.
///
/// Must follow [`Authenticate`]; with no identity in context it fails closed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireAdmin;

impl Interceptor for RequireAdmin {
    fn name(&self) -> &'static str {
        "require_admin"
    }

    fn intercept(&self, parts: &Parts, ctx: &mut RequestContext) -> Result<(), ApiError> {
        let Some(identity) = ctx.identity else {
            tracing::warn!(path = %parts.uri.path(), "Admin check ran without an identity");
            return Err(ApiError::Unauthorized("Authentication required".to_string()));
        };

        if !identity.role.is_admin() {
            tracing::info!(
                user_id = %identity.user_id,
                path = %parts.uri.path(),
                "Admin role required"
            );
            return Err(ApiError::Forbidden("Admin role required".to_string()));
        }

        Ok(())
    }
}

/// Ordered list of interceptors applied to a group of routes.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    steps: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    /// An empty chain: every request passes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interceptor.
    #[must_use]
    pub fn then(mut self, step: impl Interceptor + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    /// No credential; throttled per client.
    #[must_use]
    pub fn public(limiter: Arc<AuthRateLimiter>) -> Self {
        Self::new().then(RateLimit::new(limiter))
    }

    /// Bearer token required.
    #[must_use]
    pub fn authenticated(jwt: Arc<JwtManager>) -> Self {
        Self::new().then(Authenticate::new(jwt))
    }

    /// Bearer token with the admin role required.
    #[must_use]
    pub fn admin(jwt: Arc<JwtManager>) -> Self {
        Self::authenticated(jwt).then(RequireAdmin)
    }

    /// Interceptor names in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every interceptor in order, stopping at the first rejection.
    ///
    /// # Errors
    ///
    /// Returns the first interceptor's rejection.
    pub fn run(&self, parts: &Parts) -> Result<RequestContext, ApiError> {
        let mut ctx = RequestContext::default();
        for step in &self.steps {
            step.intercept(parts, &mut ctx)?;
        }
        Ok(ctx)
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Axum middleware that runs a chain and hands the context to the handler.
pub async fn enforce(
    State(chain): State<InterceptorChain>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    match chain.run(&parts) {
        Ok(ctx) => {
            let mut request = Request::from_parts(parts, body);
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(rejection) => rejection.into_response(),
    }
}

/// Extractor for the authenticated caller.
///
/// Reads the identity placed by [`Authenticate`]; it never re-parses the
/// Authorization header.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.identity)
            .map(CurrentUser)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
    }
}
