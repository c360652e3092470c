//! Signing secret generation.

use placebook_gateway::JwtManager;

use crate::ui;

/// Print a fresh hex-encoded signing secret.
///
/// With `raw`, print only the secret so it can be piped.
pub fn run_secret(raw: bool) {
    let secret = JwtManager::generate_hex_secret();

    if raw {
        println!("{secret}");
        return;
    }

    ui::header("New signing secret");
    println!("{secret}");
    println!();
    ui::info("Set it as auth.jwtSecret in the config file or export PLACEBOOK_JWT_SECRET.");
    ui::warning("Changing the secret invalidates every issued token.");
}
