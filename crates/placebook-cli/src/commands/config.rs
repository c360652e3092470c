//! Config inspection commands.

use std::path::PathBuf;

use anyhow::Result;
use placebook_core::Config;

use super::{config_path, load_config};
use crate::ui;

/// Config subcommands.
#[derive(Debug, Clone, Copy)]
pub enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Check the configuration is ready to serve.
    Validate,
    /// Print the config file location.
    Path,
}

/// Run a config subcommand.
///
/// # Errors
///
/// Returns error if the config cannot be loaded, or fails validation.
pub fn run_config(action: ConfigAction, explicit: Option<PathBuf>) -> Result<()> {
    match action {
        ConfigAction::Show => show(explicit),
        ConfigAction::Validate => validate(explicit),
        ConfigAction::Path => {
            println!("{}", config_path(explicit.as_deref()).display());
            Ok(())
        }
    }
}

fn show(explicit: Option<PathBuf>) -> Result<()> {
    let config = load_config(explicit.as_deref())?;

    // The secret is never serialized; report only whether it is set
    println!("{}", serde_json::to_string_pretty(&config)?);
    println!();
    ui::kv(
        "auth.jwtSecret",
        if config.auth.jwt_secret.is_some() { "set" } else { "not set" },
    );
    ui::kv("storage.dataDir", &config.storage.data_dir().display().to_string());
    ui::kv("storage.uploadsDir", &config.storage.uploads_dir().display().to_string());
    Ok(())
}

fn validate(explicit: Option<PathBuf>) -> Result<()> {
    let path = config_path(explicit.as_deref());
    let config: Config = match load_config(explicit.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            return Err(e);
        }
    };

    if let Err(e) = config.require_jwt_secret() {
        ui::error(&e.to_string());
        ui::info("Run 'placebook secret generate' to create one");
        anyhow::bail!("Configuration is not ready to serve");
    }

    ui::success(&format!("Configuration is valid ({})", path.display()));
    Ok(())
}
