//! Placebook CLI - Command-line interface for Placebook.

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "placebook")]
#[command(about = "Placebook - place reservation server")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (default: $PLACEBOOK_STATE_DIR/placebook.json)
    #[arg(short, long, global = true, env = "PLACEBOOK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address
        #[arg(long)]
        bind: Option<String>,
    },

    /// User management (run while the server is stopped)
    Admin {
        #[command(subcommand)]
        action: AdminCommands,

        /// Data directory override
        #[arg(long, global = true)]
        data_dir: Option<PathBuf>,
    },

    /// Signing secret utilities
    Secret {
        #[command(subcommand)]
        action: SecretCommands,
    },

    /// Configuration inspection
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create a new user
    Create {
        /// Email for the new user
        #[arg(long)]
        email: String,

        /// Password (or use --generate-password; prompts if neither is given)
        #[arg(long)]
        password: Option<String>,

        /// User role: user or admin
        #[arg(long, default_value = "admin")]
        role: String,

        /// Generate a random password
        #[arg(long)]
        generate_password: bool,
    },

    /// Grant the admin role to an existing user
    Promote {
        /// Email of the user
        #[arg(long)]
        email: String,
    },

    /// List all users
    List,
}

#[derive(Subcommand)]
enum SecretCommands {
    /// Generate a random 256-bit signing secret
    Generate {
        /// Print only the secret
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Validate configuration
    Validate,

    /// Print the config file path
    Path,
}

fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Serve { port, bind } => {
            let args = commands::serve::ServeArgs {
                port,
                bind,
                config: cli.config,
            };
            commands::run_serve(args).await?;
        }

        Commands::Admin { action, data_dir } => {
            let args = commands::admin::AdminArgs {
                action: match action {
                    AdminCommands::Create {
                        email,
                        password,
                        role,
                        generate_password,
                    } => commands::admin::AdminAction::Create {
                        email,
                        password,
                        role,
                        generate_password,
                    },
                    AdminCommands::Promote { email } => {
                        commands::admin::AdminAction::Promote { email }
                    }
                    AdminCommands::List => commands::admin::AdminAction::List,
                },
                data_dir,
                config: cli.config,
            };
            commands::run_admin(args)?;
        }

        Commands::Secret { action } => match action {
            SecretCommands::Generate { raw } => commands::run_secret(raw),
        },

        Commands::Config { action } => {
            let action = match action {
                Some(ConfigCommands::Validate) => commands::config::ConfigAction::Validate,
                Some(ConfigCommands::Path) => commands::config::ConfigAction::Path,
                Some(ConfigCommands::Show) | None => commands::config::ConfigAction::Show,
            };
            commands::run_config(action, cli.config)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_admin_create() {
        let cli = Cli::try_parse_from([
            "placebook",
            "admin",
            "create",
            "--email",
            "root@x.com",
            "--generate-password",
            "--data-dir",
            "/tmp/pb",
        ])
        .unwrap();

        let Commands::Admin { action, data_dir } = cli.command else {
            panic!("expected admin command");
        };
        assert_eq!(data_dir, Some(PathBuf::from("/tmp/pb")));
        assert!(matches!(
            action,
            AdminCommands::Create { generate_password: true, ref role, .. } if role == "admin"
        ));
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from(["placebook", "-v", "serve", "--port", "9000"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Serve {
                port: Some(9000),
                bind: None
            }
        ));
    }
}
