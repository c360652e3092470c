//! API error taxonomy and its JSON rendering.

use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use placebook_core::{StoreError, ValidationError};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::auth::setup::SetupError;
use crate::blob::BlobError;

/// Every way a request can fail.
///
/// Handlers only act on validation and not-found cases themselves; storage
/// and credential failures propagate here unchanged.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing request fields.
    #[error("{0}")]
    Validation(String),

    /// Missing, invalid or expired credential.
    #[error("{0}")]
    Unauthorized(String),

    /// Valid credential, insufficient role.
    #[error("{0}")]
    Forbidden(String),

    /// Entity lookup miss.
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation.
    #[error("{0}")]
    Conflict(String),

    /// Route exists but not for this method.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Request did not finish within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// Client exceeded its request budget.
    #[error("Too many requests")]
    TooManyRequests,

    /// Storage backend failure.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Anything else that is the server's fault.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::Timeout => "request_timeout",
            Self::TooManyRequests => "too_many_requests",
            Self::Persistence(_) => "persistence_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Backend details stay in the log
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            error: message,
            code: self.code(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } | StoreError::Stale { .. } => {
                Self::Conflict(err.to_string())
            }
            StoreError::NotFound { .. } => Self::NotFound(err.to_string()),
            StoreError::Backend(_) | StoreError::Serialization(_) => {
                Self::Persistence(err.to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Malformed(_)
            | AuthError::SignatureInvalid
            | AuthError::Expired
            | AuthError::MissingCredentials
            | AuthError::InvalidCredentials => Self::Unauthorized(err.to_string()),
            AuthError::Hashing(_) | AuthError::Config(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<SetupError> for ApiError {
    fn from(err: SetupError) -> Self {
        match err {
            SetupError::Validation(e) => e.into(),
            SetupError::Auth(e) => e.into(),
            SetupError::Store(e) => e.into(),
            SetupError::UnknownEmail(_) => Self::NotFound("User not found".to_string()),
        }
    }
}

impl From<BlobError> for ApiError {
    fn from(err: BlobError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::Validation("Upload exceeds the maximum allowed size".to_string())
        } else {
            Self::Validation(format!("Invalid multipart body: {}", err.body_text()))
        }
    }
}
