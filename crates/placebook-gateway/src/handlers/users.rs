//! Registration, login, profile and admin user management.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use placebook_core::validation::{normalize_email, validate_password};
use placebook_core::{NewUser, PublicUser, Role, User};
use serde::{Deserialize, Serialize};

use super::ApiResult;
use crate::auth::setup::promote;
use crate::auth::{
    AuthError, CurrentUser, IssuedToken, hash_password_blocking, verify_password_blocking,
};
use crate::error::ApiError;
use crate::server::GatewayState;

/// Email and password pair.
#[derive(Debug, Deserialize)]
pub(crate) struct Credentials {
    email: String,
    password: String,
}

/// Session token plus the account it belongs to.
#[derive(Debug, Serialize)]
pub(crate) struct AuthResponse {
    token: String,
    token_type: String,
    expires_at: DateTime<Utc>,
    user: PublicUser,
}

impl AuthResponse {
    fn new(issued: IssuedToken, user: &User) -> Self {
        Self {
            token: issued.token,
            token_type: issued.token_type,
            expires_at: issued.expires_at,
            user: user.to_public(),
        }
    }
}

/// Wrapper for single-user responses.
#[derive(Debug, Serialize)]
pub(crate) struct ProfileResponse {
    user: PublicUser,
}

/// Body of `POST /make-admin`.
#[derive(Debug, Deserialize)]
pub(crate) struct PromoteRequest {
    email: String,
}

/// Plain confirmation message.
#[derive(Debug, Serialize)]
pub(crate) struct MessageResponse {
    message: &'static str,
}

/// `POST /register`
pub(crate) async fn register(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let Json(body) = payload?;

    let email = normalize_email(&body.email)?;
    validate_password(&body.password)?;
    let password_hash = hash_password_blocking(body.password).await?;

    let user = state.store.create_user(NewUser {
        email,
        password_hash,
        role: Role::User,
    })?;
    tracing::info!(user_id = %user.id, email = %user.email, "User registered");

    let issued = state.jwt.issue(user.id, user.role)?;
    Ok((StatusCode::CREATED, Json(AuthResponse::new(issued, &user))))
}

/// `POST /login`
///
/// Unknown email and wrong password produce the same response.
pub(crate) async fn login(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Json<AuthResponse>> {
    let Json(body) = payload?;

    let user = match normalize_email(&body.email) {
        Ok(email) => state.store.find_user_by_email(&email)?,
        Err(_) => None,
    };

    let Some(user) = user else {
        // Same Argon2 cost as a wrong password
        verify_password_blocking(body.password, state.decoy_hash.clone()).await;
        tracing::info!(email = %body.email.trim(), "Login for unknown email");
        return Err(AuthError::InvalidCredentials.into());
    };

    if !verify_password_blocking(body.password, user.password_hash.clone()).await {
        tracing::info!(user_id = %user.id, "Login with wrong password");
        return Err(AuthError::InvalidCredentials.into());
    }

    tracing::info!(user_id = %user.id, "User logged in");
    let issued = state.jwt.issue(user.id, user.role)?;
    Ok(Json(AuthResponse::new(issued, &user)))
}

/// `GET /profile`
pub(crate) async fn profile(
    State(state): State<Arc<GatewayState>>,
    CurrentUser(identity): CurrentUser,
) -> ApiResult<Json<ProfileResponse>> {
    let user = state
        .store
        .get_user(identity.user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(ProfileResponse {
        user: user.to_public(),
    }))
}

/// `POST /make-admin`
pub(crate) async fn make_admin(
    State(state): State<Arc<GatewayState>>,
    CurrentUser(caller): CurrentUser,
    payload: Result<Json<PromoteRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(body) = payload?;

    let user = promote(state.store.as_ref(), &body.email)?;
    tracing::info!(by = %caller.user_id, user_id = %user.id, "Admin role granted");

    Ok(Json(MessageResponse {
        message: "User promoted to admin",
    }))
}

/// `GET /users`
pub(crate) async fn list_users(
    State(state): State<Arc<GatewayState>>,
) -> ApiResult<Json<Vec<PublicUser>>> {
    let users = state.store.list_users()?;
    Ok(Json(users.iter().map(User::to_public).collect()))
}
