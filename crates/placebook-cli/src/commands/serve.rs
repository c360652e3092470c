//! Serve command: run the HTTP gateway.

use std::path::PathBuf;

use anyhow::Context;
use placebook_gateway::GatewayConfig;

use super::load_config;
use crate::ui;

/// Serve command arguments.
#[derive(Debug, Clone, Default)]
pub struct ServeArgs {
    /// Port override.
    pub port: Option<u16>,
    /// Bind address override.
    pub bind: Option<String>,
    /// Config file override.
    pub config: Option<PathBuf>,
}

/// Load config, open storage and serve until Ctrl-C.
///
/// # Errors
///
/// Returns error if the config is invalid, the signing secret is missing,
/// storage cannot be opened or the port cannot be bound.
pub async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(port) = args.port {
        config.gateway.port = port;
    }
    if let Some(bind) = args.bind {
        config.gateway.bind_address = bind;
    }
    config.validate()?;

    config
        .require_jwt_secret()
        .context("A signing secret is required; run 'placebook secret generate'")?;

    let gateway_config = GatewayConfig::from(&config);

    ui::header("Starting Placebook");
    ui::kv(
        "Address",
        &format!("{}:{}", gateway_config.bind_address, gateway_config.port),
    );
    ui::kv("Data", &gateway_config.data_dir.display().to_string());
    ui::kv("Uploads", &gateway_config.uploads_dir.display().to_string());
    ui::kv(
        "Token lifetime",
        &format!("{}h", gateway_config.auth.token_expiry_hours),
    );
    println!();
    ui::info("Press Ctrl+C to stop");

    placebook_gateway::start(gateway_config)
        .await
        .context("Gateway failed")?;

    Ok(())
}
