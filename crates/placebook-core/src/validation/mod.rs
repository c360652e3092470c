//! Input validation and sanitization.
//!
//! Every request field is checked here before it reaches storage.

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Validation error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is absent or blank.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Input exceeds maximum allowed length.
    #[error("Field '{field}' exceeds maximum length ({max}, got {actual})")]
    TooLong {
        /// Offending field.
        field: String,
        /// Maximum allowed length.
        max: usize,
        /// Actual input length.
        actual: usize,
    },

    /// Email address is not usable.
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    /// Password rejected.
    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    /// Booking interval rejected.
    #[error("Invalid time slot: {0}")]
    InvalidTimeSlot(String),

    /// Identifier is not a positive integer.
    #[error("Invalid id: {0}")]
    InvalidId(String),

    /// Role outside the known set.
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Anything else wrong with the request shape.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Size limits per input type.
pub mod limits {
    /// Maximum email length (RFC 5321 path limit).
    pub const MAX_EMAIL_LENGTH: usize = 254;

    /// Maximum password length in bytes. Bounds hashing cost.
    pub const MAX_PASSWORD_LENGTH: usize = 1024;

    /// Maximum place name / location length in characters.
    pub const MAX_TEXT_LENGTH: usize = 200;

    /// Maximum stored filename length.
    pub const MAX_FILENAME_LENGTH: usize = 100;
}

/// Normalize and check an email address.
///
/// Trims, lowercases and requires a single `@` with non-empty local and
/// domain parts and no whitespace.
///
/// # Errors
///
/// Returns `ValidationError::MissingField` for blank input and
/// `ValidationError::InvalidEmail` otherwise.
pub fn normalize_email(input: &str) -> Result<String, ValidationError> {
    let email = input.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationError::MissingField("email".to_string()));
    }
    if email.len() > limits::MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: limits::MAX_EMAIL_LENGTH,
            actual: email.len(),
        });
    }

    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ValidationError::InvalidEmail(input.to_string()));
    };

    if local.is_empty()
        || domain.is_empty()
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(ValidationError::InvalidEmail(input.to_string()));
    }

    Ok(email)
}

/// Check a plaintext password before hashing.
///
/// # Errors
///
/// Returns error if the password is empty or too long.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::MissingField("password".to_string()));
    }
    if password.len() > limits::MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong {
            field: "password".to_string(),
            max: limits::MAX_PASSWORD_LENGTH,
            actual: password.len(),
        });
    }
    Ok(())
}

/// Sanitize a free-text field (place name, location).
///
/// Performs:
/// 1. Strip control chars
/// 2. Unicode normalization (NFKC), so visually identical names collide
/// 3. Trim, then require non-empty and at most `max_chars` characters
///
/// # Errors
///
/// Returns `MissingField` for blank input, `TooLong` past the limit.
pub fn sanitize_text(
    field: &str,
    input: &str,
    max_chars: usize,
) -> Result<String, ValidationError> {
    let sanitized: String = input.chars().filter(|c| !c.is_control()).collect();
    let normalized: String = sanitized.nfkc().collect();
    let trimmed = normalized.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field.to_string()));
    }

    let actual = trimmed.chars().count();
    if actual > max_chars {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: max_chars,
            actual,
        });
    }

    Ok(trimmed.to_string())
}

/// Reduce an uploaded filename to a safe basename.
///
/// Drops any directory components, maps everything outside
/// `[A-Za-z0-9._-]` to `_`, strips leading dots, and caps the length.
#[must_use]
pub fn sanitize_filename(original: &str) -> String {
    let basename = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = basename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    let mut result: String = cleaned.chars().take(limits::MAX_FILENAME_LENGTH).collect();
    if result.is_empty() {
        result = "upload".to_string();
    }
    result
}

/// Unwrap an optional field or report it missing.
///
/// # Errors
///
/// Returns `MissingField` if `value` is `None`.
pub fn require<T>(field: &str, value: Option<T>) -> Result<T, ValidationError> {
    value.ok_or_else(|| ValidationError::MissingField(field.to_string()))
}
