//! CLI command implementations.

pub mod admin;
pub mod config;
pub mod secret;
pub mod serve;

pub use admin::run_admin;
pub use config::run_config;
pub use secret::run_secret;
pub use serve::run_serve;

use std::path::{Path, PathBuf};

use anyhow::Context;
use placebook_core::Config;

/// Config file in effect: the explicit path or the default location.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(Config::default_path, Path::to_path_buf)
}

/// Load the config file (defaults if absent) and apply environment overrides.
///
/// # Errors
///
/// Returns error if the file exists but cannot be read, parsed or validated.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    load_config_with(explicit, |key| std::env::var(key).ok())
}

fn load_config_with(
    explicit: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Config> {
    let path = config_path(explicit);

    let config = if path.exists() {
        Config::load(&path).with_context(|| format!("Failed to load {}", path.display()))?
    } else if explicit.is_some() {
        anyhow::bail!("Config file not found: {}", path.display());
    } else {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        Config::default()
    };

    let config = config.with_overrides(lookup);
    config
        .validate()
        .context("Invalid configuration after environment overrides")?;
    Ok(config)
}
