//! Bearer authentication for axum
//!
//! The API's auth layer calls [`authenticate_bearer`] and inserts the
//! resulting [`AuthContext`] into request extensions. Handlers behind that
//! layer take `auth: AuthContext` as an extractor.
//!
//! # Example
//!
//! ```no_run
//! use pollbox_shared::auth::middleware::AuthContext;
//!
//! async fn whoami(auth: AuthContext) -> String {
//!     format!("user {}", auth.user_id)
//! }
//! ```

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::jwt::{validate_access_token, JwtError};

/// Identity of the caller, taken from a validated access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Token subject
    pub user_id: i64,
}

impl AuthContext {
    pub fn new(user_id: i64) -> Self {
        Self { user_id }
    }

    /// Whether `user_id` names the caller
    pub fn is(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}

/// Error type for bearer authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingCredentials,

    #[error("{0}")]
    InvalidFormat(String),

    #[error("{0}")]
    InvalidToken(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": "unauthorized",
            "message": self.to_string(),
        });

        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

/// Validates the `Authorization: Bearer <token>` header
///
/// # Errors
///
/// - `AuthError::MissingCredentials` if there is no usable header
/// - `AuthError::InvalidFormat` if it is not a bearer credential
/// - `AuthError::InvalidToken` if the token is invalid, expired, or a
///   refresh token
pub fn authenticate_bearer(headers: &HeaderMap, secret: &str) -> Result<AuthContext, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    let claims = validate_access_token(token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        JwtError::WrongTokenType { .. } => {
            AuthError::InvalidToken("Expected an access token".to_string())
        }
        _ => AuthError::InvalidToken("Invalid token".to_string()),
    })?;

    let user_id = claims
        .user_id()
        .map_err(|_| AuthError::InvalidToken("Invalid token subject".to_string()))?;

    Ok(AuthContext::new(user_id))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or(AuthError::MissingCredentials)
    }
}
