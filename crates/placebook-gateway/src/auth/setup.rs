//! Admin provisioning: first-run bootstrap and promotion.

use placebook_core::validation::{normalize_email, validate_password};
use placebook_core::{NewUser, Persistence, Role, StoreError, User, ValidationError};
use rand::Rng;
use thiserror::Error;

use super::AuthError;
use super::password::hash_password;

/// Environment variable holding the bootstrap admin email.
pub const ADMIN_EMAIL_VAR: &str = "PLACEBOOK_ADMIN_EMAIL";

/// Environment variable holding the bootstrap admin password.
pub const ADMIN_PASSWORD_VAR: &str = "PLACEBOOK_ADMIN_PASSWORD";

/// Provisioning errors.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Email or password rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Hashing failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Storage failed or the email is taken.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No user with that email.
    #[error("No user with email {0}")]
    UnknownEmail(String),
}

/// Validate, hash and store a new account.
///
/// # Errors
///
/// Returns error on invalid input, a duplicate email or storage failure.
pub fn create_account(
    store: &dyn Persistence,
    email: &str,
    password: &str,
    role: Role,
) -> Result<User, SetupError> {
    let email = normalize_email(email)?;
    validate_password(password)?;
    let password_hash = hash_password(password)?;

    let user = store.create_user(NewUser {
        email,
        password_hash,
        role,
    })?;

    tracing::info!(
        user_id = %user.id,
        email = %user.email,
        role = %user.role.as_str(),
        "Account created"
    );
    Ok(user)
}

/// Grant the admin role to the user with this email.
///
/// Promoting an existing admin is a no-op that still succeeds.
///
/// # Errors
///
/// Returns `UnknownEmail` if no such user exists.
pub fn promote(store: &dyn Persistence, email: &str) -> Result<User, SetupError> {
    let email = normalize_email(email)?;
    let mut user = store
        .find_user_by_email(&email)?
        .ok_or_else(|| SetupError::UnknownEmail(email.clone()))?;

    if user.role.is_admin() {
        tracing::debug!(user_id = %user.id, "User is already an admin");
        return Ok(user);
    }

    user.role = Role::Admin;
    store.update_user(&user)?;
    tracing::info!(user_id = %user.id, email = %user.email, "User promoted to admin");
    Ok(user)
}

/// Auto-setup from `PLACEBOOK_ADMIN_EMAIL` and `PLACEBOOK_ADMIN_PASSWORD`.
///
/// # Errors
///
/// Returns error if account creation fails.
pub fn auto_setup_from_env(store: &dyn Persistence) -> Result<Option<User>, SetupError> {
    auto_setup_with(store, |key| std::env::var(key).ok())
}

/// Bootstrap an admin from variables supplied by `lookup`.
///
/// Does nothing unless both variables are non-empty and no admin exists yet.
/// If the email already belongs to a user, that user is promoted instead.
///
/// # Errors
///
/// Returns error if account creation or promotion fails.
pub fn auto_setup_with(
    store: &dyn Persistence,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<User>, SetupError> {
    if store.count_admins()? > 0 {
        return Ok(None);
    }

    let Some(email) = lookup(ADMIN_EMAIL_VAR).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let Some(password) = lookup(ADMIN_PASSWORD_VAR).filter(|v| !v.is_empty()) else {
        tracing::warn!(
            "{ADMIN_EMAIL_VAR} is set without {ADMIN_PASSWORD_VAR}; skipping admin bootstrap"
        );
        return Ok(None);
    };

    let admin = if store.find_user_by_email(&normalize_email(&email)?)?.is_some() {
        promote(store, &email)?
    } else {
        create_account(store, &email, &password, Role::Admin)?
    };

    tracing::info!(email = %admin.email, "Admin bootstrapped from environment variables");
    Ok(Some(admin))
}

/// Generate a secure random password.
#[must_use]
pub fn generate_password(length: usize) -> String {
    const CHARSET: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use placebook_core::SledStore;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_create_account() {
        let store = SledStore::temporary().unwrap();
        let user = create_account(&store, " Ann@Example.com", "p1", Role::User).unwrap();

        assert_eq!(user.email, "ann@example.com");
        assert_eq!(user.role, Role::User);
        assert!(verify_password("p1", &user.password_hash));

        let dup = create_account(&store, "ann@example.com", "p2", Role::User);
        assert!(matches!(dup, Err(SetupError::Store(StoreError::Conflict { .. }))));
    }

    #[test]
    fn test_create_account_rejects_bad_input() {
        let store = SledStore::temporary().unwrap();
        assert!(matches!(
            create_account(&store, "not-an-email", "p1", Role::User),
            Err(SetupError::Validation(_))
        ));
        assert!(matches!(
            create_account(&store, "a@x.com", "", Role::User),
            Err(SetupError::Validation(_))
        ));
        assert!(store.list_users().unwrap().is_empty());
    }

    #[test]
    fn test_promote_is_idempotent() {
        let store = SledStore::temporary().unwrap();
        create_account(&store, "a@x.com", "p1", Role::User).unwrap();

        let first = promote(&store, "A@X.com").unwrap();
        assert_eq!(first.role, Role::Admin);
        let second = promote(&store, "a@x.com").unwrap();
        assert_eq!(second.role, Role::Admin);
        assert_eq!(store.count_admins().unwrap(), 1);
    }

    #[test]
    fn test_promote_unknown_email() {
        let store = SledStore::temporary().unwrap();
        assert!(matches!(
            promote(&store, "ghost@x.com"),
            Err(SetupError::UnknownEmail(_))
        ));
    }

    #[test]
    fn test_auto_setup_requires_both_vars() {
        let store = SledStore::temporary().unwrap();
        assert!(auto_setup_with(&store, env(&[])).unwrap().is_none());
        assert!(
            auto_setup_with(&store, env(&[(ADMIN_EMAIL_VAR, "root@x.com")]))
                .unwrap()
                .is_none()
        );
        assert_eq!(store.count_admins().unwrap(), 0);
    }

    #[test]
    fn test_auto_setup_creates_admin_once() {
        let store = SledStore::temporary().unwrap();
        let vars = [(ADMIN_EMAIL_VAR, "root@x.com"), (ADMIN_PASSWORD_VAR, "s3cret")];

        let admin = auto_setup_with(&store, env(&vars)).unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(verify_password("s3cret", &admin.password_hash));

        // An admin exists now
        assert!(auto_setup_with(&store, env(&vars)).unwrap().is_none());
        assert_eq!(store.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_auto_setup_promotes_existing_user() {
        let store = SledStore::temporary().unwrap();
        let existing = create_account(&store, "root@x.com", "original", Role::User).unwrap();

        let vars = [(ADMIN_EMAIL_VAR, "root@x.com"), (ADMIN_PASSWORD_VAR, "other")];
        let admin = auto_setup_with(&store, env(&vars)).unwrap().unwrap();

        assert_eq!(admin.id, existing.id);
        assert_eq!(admin.role, Role::Admin);
        // Password is left alone
        assert!(verify_password("original", &admin.password_hash));
    }

    #[test]
    fn test_generate_password() {
        let a = generate_password(24);
        let b = generate_password(24);
        assert_eq!(a.chars().count(), 24);
        assert_ne!(a, b);
    }
}
