//! Configuration loading and validation.
//!
//! JSON5 format, camelCase keys, every field defaulted.
//! Config location: `~/.placebook/placebook.json`

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Minimum signing secret size in bytes (hex-encoded in config).
pub const MIN_SECRET_BYTES: usize = 32;

/// Longest allowed session token lifetime (one year).
pub const MAX_TOKEN_EXPIRY_HOURS: u64 = 366 * 24;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Token signing configuration.
    #[serde(default)]
    pub auth: AuthSettings,

    /// Storage locations.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate JSON5 content.
    ///
    /// # Errors
    ///
    /// Returns error if content is not valid JSON5 or fails validation.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("placebook.json")
    }

    /// Get the Placebook state directory.
    ///
    /// Uses `PLACEBOOK_STATE_DIR` env var if set, otherwise `~/.placebook`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("PLACEBOOK_STATE_DIR") {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".placebook")
        } else {
            PathBuf::from(".placebook")
        }
    }

    /// Apply process environment overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Recognized keys: `PLACEBOOK_JWT_SECRET`, `PLACEBOOK_PORT`,
    /// `PLACEBOOK_DATA_DIR`, `PLACEBOOK_UPLOADS_DIR`. Unparsable values are
    /// ignored with a warning.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(secret) = lookup("PLACEBOOK_JWT_SECRET").filter(|s| !s.is_empty()) {
            self.auth.jwt_secret = Some(SecretString::from(secret));
        }

        if let Some(port) = lookup("PLACEBOOK_PORT") {
            match port.parse() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid PLACEBOOK_PORT"),
            }
        }

        if let Some(dir) = lookup("PLACEBOOK_DATA_DIR").filter(|s| !s.is_empty()) {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(dir) = lookup("PLACEBOOK_UPLOADS_DIR").filter(|s| !s.is_empty()) {
            self.storage.uploads_dir = Some(PathBuf::from(dir));
        }

        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.port == 0 {
            return Err(ConfigError::Validation(
                "Gateway port cannot be 0".to_string(),
            ));
        }

        if self.gateway.max_upload_bytes == 0 {
            return Err(ConfigError::Validation(
                "maxUploadBytes must be greater than 0".to_string(),
            ));
        }

        if self.auth.token_expiry_hours == 0 {
            return Err(ConfigError::Validation(
                "tokenExpiryHours must be greater than 0".to_string(),
            ));
        }

        if self.auth.token_expiry_hours > MAX_TOKEN_EXPIRY_HOURS {
            return Err(ConfigError::Validation(format!(
                "tokenExpiryHours must be at most {MAX_TOKEN_EXPIRY_HOURS}"
            )));
        }

        if let Some(secret) = &self.auth.jwt_secret {
            check_hex_secret(secret.expose_secret())?;
        }

        Ok(())
    }

    /// The signing secret, required before serving traffic.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` when no secret is configured, `Validation` if it
    /// is malformed.
    pub fn require_jwt_secret(&self) -> Result<&SecretString, ConfigError> {
        let secret = self
            .auth
            .jwt_secret
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField("auth.jwtSecret".to_string()))?;
        check_hex_secret(secret.expose_secret())?;
        Ok(secret)
    }
}

fn check_hex_secret(secret: &str) -> Result<(), ConfigError> {
    if secret.len() % 2 != 0 || !secret.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::Validation(
            "jwtSecret must be hex-encoded".to_string(),
        ));
    }
    if secret.len() / 2 < MIN_SECRET_BYTES {
        return Err(ConfigError::Validation(format!(
            "jwtSecret must be at least {MIN_SECRET_BYTES} bytes"
        )));
    }
    Ok(())
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Enable permissive CORS.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Largest accepted request body (image uploads).
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,

    /// Login/register attempts allowed per client per minute.
    #[serde(default = "default_auth_rpm")]
    pub auth_requests_per_minute: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            cors: true,
            timeout_secs: default_timeout(),
            max_upload_bytes: default_max_upload(),
            auth_requests_per_minute: default_auth_rpm(),
        }
    }
}

const fn default_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_timeout() -> u64 {
    30
}

const fn default_max_upload() -> usize {
    10 * 1024 * 1024
}

const fn default_auth_rpm() -> u32 {
    30
}

const fn default_token_expiry() -> u64 {
    24
}

/// Token signing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSettings {
    /// Hex-encoded HMAC secret. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub jwt_secret: Option<SecretString>,

    /// Session token lifetime in hours.
    #[serde(default = "default_token_expiry")]
    pub token_expiry_hours: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_expiry_hours: default_token_expiry(),
        }
    }
}

/// Storage locations. Unset paths resolve under the state directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Database directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Uploaded image directory.
    #[serde(default)]
    pub uploads_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolved database directory.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| Config::state_dir().join("data"))
    }

    /// Resolved uploads directory.
    #[must_use]
    pub fn uploads_dir(&self) -> PathBuf {
        self.uploads_dir
            .clone()
            .unwrap_or_else(|| Config::state_dir().join("uploads"))
    }
}
