//! Admin user management commands.
//!
//! These open the store directly, so they must run while the server is
//! stopped (sled holds an exclusive lock on the database).

use std::path::PathBuf;

use anyhow::Context;
use placebook_core::{Persistence, Role, SledStore};
use placebook_gateway::auth::setup::{create_account, generate_password, promote};

use super::load_config;
use crate::ui;
use crate::ui::prompts;

/// Arguments for admin commands.
pub struct AdminArgs {
    /// The admin action to perform.
    pub action: AdminAction,
    /// Data directory override.
    pub data_dir: Option<PathBuf>,
    /// Config file override.
    pub config: Option<PathBuf>,
}

/// Admin actions.
pub enum AdminAction {
    /// Create a new user.
    Create {
        email: String,
        password: Option<String>,
        role: String,
        generate_password: bool,
    },
    /// Grant the admin role.
    Promote { email: String },
    /// List all users.
    List,
}

/// Run the admin command.
///
/// # Errors
///
/// Returns error if the store cannot be opened or the operation fails.
pub fn run_admin(args: AdminArgs) -> anyhow::Result<()> {
    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => load_config(args.config.as_deref())?.storage.data_dir(),
    };

    let store = SledStore::open(&data_dir).with_context(|| {
        format!(
            "Failed to open store at {} (is the server running?)",
            data_dir.display()
        )
    })?;

    match args.action {
        AdminAction::Create {
            email,
            password,
            role,
            generate_password: gen_pwd,
        } => create_user(&store, &email, password, &role, gen_pwd)?,
        AdminAction::Promote { email } => {
            let user = promote(&store, &email)?;
            ui::success(&format!("'{}' is now an admin", user.email));
        }
        AdminAction::List => list_users(&store)?,
    }

    store.flush()?;
    Ok(())
}

fn create_user(
    store: &dyn Persistence,
    email: &str,
    password: Option<String>,
    role_str: &str,
    gen_pwd: bool,
) -> anyhow::Result<()> {
    let role: Role = role_str
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid role: {role_str}. Use: user or admin"))?;

    let password = match (password, gen_pwd) {
        (Some(_), true) => anyhow::bail!("Use either --password or --generate-password, not both"),
        (Some(password), false) => password,
        (None, true) => {
            let pwd = generate_password(16);
            ui::success(&format!("Generated password: {pwd}"));
            pwd
        }
        (None, false) => prompts::new_password("Password")?,
    };

    let user = create_account(store, email, &password, role)?;
    ui::success(&format!(
        "Created user '{}' with role '{}'",
        user.email,
        user.role.as_str()
    ));
    Ok(())
}

fn list_users(store: &dyn Persistence) -> anyhow::Result<()> {
    let users = store.list_users()?;

    if users.is_empty() {
        ui::info("No users registered.");
        ui::info(
            "Run 'placebook admin create --email <EMAIL> --generate-password' to create an admin.",
        );
        return Ok(());
    }

    ui::info(&format!("Users ({}):", users.len()));
    println!();
    println!("{:<6} {:<32} {:<8} {:<20}", "ID", "EMAIL", "ROLE", "CREATED");
    println!("{}", "-".repeat(68));

    for user in users {
        println!(
            "{:<6} {:<32} {:<8} {:<20}",
            user.id,
            user.email,
            user.role.as_str(),
            user.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}
