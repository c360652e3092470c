//! Authentication configuration.

use std::time::Duration;

use placebook_core::config::{AuthSettings, MAX_TOKEN_EXPIRY_HOURS};
use secrecy::{ExposeSecret, SecretString};

use super::AuthError;
use super::jwt::JwtManager;

/// Default token expiry in hours.
const DEFAULT_TOKEN_EXPIRY_HOURS: u64 = 24;

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Hex-encoded JWT signing secret. Required to serve.
    pub jwt_secret: Option<SecretString>,

    /// Session token expiry in hours.
    pub token_expiry_hours: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_expiry_hours: DEFAULT_TOKEN_EXPIRY_HOURS,
        }
    }
}

impl From<&AuthSettings> for AuthConfig {
    fn from(settings: &AuthSettings) -> Self {
        Self {
            jwt_secret: settings.jwt_secret.clone(),
            token_expiry_hours: settings.token_expiry_hours,
        }
    }
}

impl AuthConfig {
    /// Create a new auth config builder.
    #[must_use]
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Get token expiry as Duration.
    #[must_use]
    pub const fn token_expiry(&self) -> Duration {
        Duration::from_secs(self.token_expiry_hours.saturating_mul(3600))
    }

    /// Build the token manager this config describes.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Config` if no secret is set, it is not hex, or
    /// the expiry is zero or longer than a year.
    pub fn jwt_manager(&self) -> Result<JwtManager, AuthError> {
        let secret = self
            .jwt_secret
            .as_ref()
            .ok_or_else(|| AuthError::Config("JWT secret is not configured".to_string()))?;

        if self.token_expiry_hours == 0 {
            return Err(AuthError::Config(
                "Token expiry must be greater than 0".to_string(),
            ));
        }
        if self.token_expiry_hours > MAX_TOKEN_EXPIRY_HOURS {
            return Err(AuthError::Config(format!(
                "Token expiry must be at most {MAX_TOKEN_EXPIRY_HOURS} hours"
            )));
        }

        JwtManager::from_hex_secret(secret.expose_secret(), self.token_expiry())
    }
}

/// Builder for `AuthConfig`.
#[derive(Debug, Default)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    /// Set the JWT secret (hex).
    #[must_use]
    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.jwt_secret = Some(SecretString::from(secret.into()));
        self
    }

    /// Set token expiry in hours.
    #[must_use]
    pub const fn token_expiry_hours(mut self, hours: u64) -> Self {
        self.config.token_expiry_hours = hours;
        self
    }

    /// Build the config.
    #[must_use]
    pub fn build(self) -> AuthConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();
        assert!(config.jwt_secret.is_none());
        assert_eq!(config.token_expiry_hours, 24);
        assert_eq!(config.token_expiry(), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_builder() {
        let config = AuthConfig::builder()
            .jwt_secret(JwtManager::generate_hex_secret())
            .token_expiry_hours(72)
            .build();

        assert_eq!(config.token_expiry(), Duration::from_secs(72 * 3600));
        assert_eq!(config.jwt_manager().unwrap().ttl(), config.token_expiry());
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let config = AuthConfig::default();
        assert!(matches!(config.jwt_manager(), Err(AuthError::Config(_))));
    }

    #[test]
    fn test_zero_expiry_rejected() {
        let config = AuthConfig::builder()
            .jwt_secret(JwtManager::generate_hex_secret())
            .token_expiry_hours(0)
            .build();
        assert!(config.jwt_manager().is_err());
    }

    #[test]
    fn test_oversized_expiry_rejected() {
        let config = AuthConfig::builder()
            .jwt_secret(JwtManager::generate_hex_secret())
            .token_expiry_hours(10_000_000_000)
            .build();
        assert!(matches!(config.jwt_manager(), Err(AuthError::Config(_))));

        let extreme = AuthConfig::builder().token_expiry_hours(u64::MAX).build();
        assert_eq!(extreme.token_expiry(), Duration::from_secs(u64::MAX));
    }
}
