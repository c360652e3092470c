//! Authentication and authorization for the gateway.
//!
//! This module provides:
//! - Password hashing and verification (Argon2id)
//! - Session token issuance and validation (HS256 JWT)
//! - Ordered request interceptors for authenticated and admin-only routes

mod config;
mod jwt;
pub(crate) mod middleware;
mod password;
/// Admin bootstrap from the environment.
pub mod setup;

pub use config::{AuthConfig, AuthConfigBuilder};
pub use jwt::{Claims, IssuedToken, JwtManager};
pub use middleware::{
    Authenticate, CurrentUser, Interceptor, InterceptorChain, RequestContext, RequireAdmin,
};
pub use password::{
    decoy_hash, hash_password, hash_password_blocking, verify_password, verify_password_blocking,
};

use placebook_core::{Role, UserId};
use thiserror::Error;

/// The authenticated caller, as asserted by a validated session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// Subject user id.
    pub user_id: UserId,
    /// Role claim at issuance time.
    pub role: Role,
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token is not a well-formed JWT, or its claims cannot be decoded.
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Token signature does not match the server secret.
    #[error("Invalid token signature")]
    SignatureInvalid,

    /// Token is past its expiration instant.
    #[error("Token expired")]
    Expired,

    /// No usable `Authorization: Bearer` header.
    #[error("Missing or malformed Authorization header")]
    MissingCredentials,

    /// Email/password pair did not match.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Password hashing failed (entropy or parameter failure).
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}
