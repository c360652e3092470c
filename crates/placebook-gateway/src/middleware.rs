//! Gateway middleware.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::request::Parts;
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};

use crate::auth::{Interceptor, RequestContext};
use crate::error::ApiError;

/// Key used when the peer address is unavailable.
const ANONYMOUS_CLIENT: &str = "anonymous";

/// Per-client limiter for credential endpoints.
pub struct AuthRateLimiter {
    client_limiter: RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
}

impl AuthRateLimiter {
    /// Create a new rate limiter.
    #[must_use]
    pub fn new(requests_per_minute: u32) -> Self {
        let quota =
            Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));
        Self {
            client_limiter: RateLimiter::keyed(quota),
        }
    }

    /// Check if a request is allowed.
    #[must_use]
    pub fn check(&self, client_id: &str) -> bool {
        self.client_limiter
            .check_key(&client_id.to_string())
            .is_ok()
    }
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::new(30)
    }
}

impl std::fmt::Debug for AuthRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRateLimiter").finish_non_exhaustive()
    }
}

/// Throttles requests by peer IP.
#[derive(Debug, Clone)]
pub struct RateLimit {
    limiter: Arc<AuthRateLimiter>,
}

impl RateLimit {
    /// Throttle against a shared limiter.
    #[must_use]
    pub const fn new(limiter: Arc<AuthRateLimiter>) -> Self {
        Self { limiter }
    }
}

impl Interceptor for RateLimit {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn intercept(&self, parts: &Parts, _ctx: &mut RequestContext) -> Result<(), ApiError> {
        let client = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map_or_else(
                || ANONYMOUS_CLIENT.to_string(),
                |ConnectInfo(addr)| addr.ip().to_string(),
            );

        if self.limiter.check(&client) {
            Ok(())
        } else {
            tracing::warn!(client = %client, path = %parts.uri.path(), "Rate limit exceeded");
            Err(ApiError::TooManyRequests)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn parts_from(addr: Option<SocketAddr>) -> Parts {
        let mut parts = Request::builder()
            .uri("/login")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        if let Some(addr) = addr {
            parts.extensions.insert(ConnectInfo(addr));
        }
        parts
    }

    #[test]
    fn test_limiter_allows_within_quota() {
        let limiter = AuthRateLimiter::new(3);
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
    }

    #[test]
    fn test_limiter_is_per_client() {
        let limiter = AuthRateLimiter::new(1);
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.2"));
    }

    #[test]
    fn test_interceptor_keys_on_peer_ip() {
        let step = RateLimit::new(Arc::new(AuthRateLimiter::new(1)));
        let mut ctx = RequestContext::default();

        let a: SocketAddr = "192.0.2.1:4000".parse().unwrap();
        let a_other_port: SocketAddr = "192.0.2.1:4001".parse().unwrap();
        let b: SocketAddr = "192.0.2.2:4000".parse().unwrap();

        assert!(step.intercept(&parts_from(Some(a)), &mut ctx).is_ok());
        let err = step
            .intercept(&parts_from(Some(a_other_port)), &mut ctx)
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(step.intercept(&parts_from(Some(b)), &mut ctx).is_ok());
    }

    #[test]
    fn test_missing_peer_shares_anonymous_bucket() {
        let step = RateLimit::new(Arc::new(AuthRateLimiter::new(1)));
        let mut ctx = RequestContext::default();
        assert!(step.intercept(&parts_from(None), &mut ctx).is_ok());
        assert!(step.intercept(&parts_from(None), &mut ctx).is_err());
    }

    #[test]
    fn test_zero_quota_clamps_to_one() {
        let limiter = AuthRateLimiter::new(0);
        assert!(limiter.check("c"));
        assert!(!limiter.check("c"));
    }
}
