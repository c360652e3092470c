//! Password hashing.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use super::AuthError;

/// Hash a password using Argon2id with a fresh random salt.
///
/// # Errors
///
/// Returns `AuthError::Hashing` only on an entropy or parameter failure.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Verify a password against a stored PHC hash.
///
/// Mismatch and an unparsable hash both yield `false`; the comparison is
/// constant-time inside argon2.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is unparsable");
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Hash of a random throwaway password.
///
/// Verifying against it costs the same as verifying a real account, so a
/// login for an unknown email takes as long as one with a wrong password.
///
/// # Errors
///
/// Returns `AuthError::Hashing` if hashing fails.
pub fn decoy_hash() -> Result<String, AuthError> {
    hash_password(&hex::encode(rand::random::<[u8; 16]>()))
}

/// [`hash_password`] on the blocking pool.
///
/// # Errors
///
/// Returns `AuthError::Hashing` if hashing fails or the task is lost.
pub async fn hash_password_blocking(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::Hashing(format!("hashing task failed: {e}")))?
}

/// [`verify_password`] on the blocking pool.
///
/// A lost task counts as a failed verification.
pub async fn verify_password_blocking(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Password verification task failed");
            false
        })
}
