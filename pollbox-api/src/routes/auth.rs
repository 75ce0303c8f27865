//! Authentication endpoints
//!
//! # Endpoints
//!
//! - `POST /api/register` - Create an account and start a session
//! - `POST /api/login` - Start a session
//! - `POST /api/refresh` - Exchange a refresh token for an access token
//! - `GET /api/me` - Identity of the bearer
//!
//! Emails are trimmed and lowercased before storage and lookup. Argon2
//! hashing runs on the blocking pool.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use pollbox_shared::{
    auth::{jwt, middleware::AuthContext, password},
    models::user::{CreateUser, Identity},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3 to 50 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Any non-empty password is accepted
    #[validate(length(min = 1, max = 128, message = "Password must be 1 to 128 characters"))]
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Session returned by register and login
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: Identity,

    /// Access token (24h)
    pub access_token: String,

    /// Refresh token (30d)
    pub refresh_token: String,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh token response
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    /// New access token (24h)
    pub access_token: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Register a new user
///
/// ```text
/// POST /api/register
///
/// { "username": "alice", "email": "a@x.com", "password": "pw" }
/// ```
///
/// Responds `201 Created` with `{ user, access_token, refresh_token }`.
///
/// # Errors
///
/// - `400 Bad Request`: Body is not valid JSON for this shape
/// - `409 Conflict`: Email or username already registered
/// - `422 Unprocessable Entity`: Field validation failed
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let Json(req) = payload?;
    let req = RegisterRequest {
        username: req.username.trim().to_string(),
        email: normalize_email(&req.email),
        password: req.password,
    };
    req.validate()?;

    let plaintext = req.password;
    let password_hash =
        tokio::task::spawn_blocking(move || password::hash_password(&plaintext)).await??;

    let user = state
        .store
        .create_user(CreateUser {
            username: req.username,
            email: req.email,
            password_hash,
        })
        .await?;

    let session = jwt::issue_session(user.id, state.jwt_secret())?;

    tracing::info!(user_id = user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user.identity(),
            access_token: session.access_token,
            refresh_token: session.refresh_token,
        }),
    ))
}

/// Log in with email and password
///
/// ```text
/// POST /api/login
///
/// { "email": "a@x.com", "password": "pw" }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown email or wrong password (same message)
/// - `422 Unprocessable Entity`: Field validation failed
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<AuthResponse>> {
    let Json(req) = payload?;
    let req = LoginRequest {
        email: normalize_email(&req.email),
        password: req.password,
    };
    req.validate()?;

    let user = state
        .store
        .find_user_by_email(&req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    let plaintext = req.password;
    let stored_hash = user.password_hash.clone();
    let valid =
        tokio::task::spawn_blocking(move || password::verify_password(&plaintext, &stored_hash))
            .await??;
    if !valid {
        tracing::debug!(user_id = user.id, "Login rejected");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let session = jwt::issue_session(user.id, state.jwt_secret())?;

    Ok(Json(AuthResponse {
        user: user.identity(),
        access_token: session.access_token,
        refresh_token: session.refresh_token,
    }))
}

/// Exchange a refresh token for a new access token
///
/// # Errors
///
/// - `401 Unauthorized`: Token invalid, expired, or not a refresh token
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Json<RefreshResponse>> {
    let Json(req) = payload?;
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(Json(RefreshResponse { access_token }))
}

/// Identity of the authenticated user
///
/// # Errors
///
/// - `404 Not Found`: The token's user no longer exists
pub async fn me(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<Identity>> {
    let user = state
        .store
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user.identity()))
}
