//! Bookmark endpoints (all require auth)
//!
//! - `GET /api/check-bookmark?user_id=&poll_id=`
//! - `POST /api/bookmark` with `{poll_id}`
//! - `DELETE /api/bookmark` with `{poll_id}`
//! - `GET /api/bookmarks/:user_id`
//!
//! A `user_id` in the path or query must be the caller's own.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use pollbox_shared::{auth::middleware::AuthContext, models::poll::Poll};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CheckBookmarkQuery {
    /// Optional; defaults to the caller
    pub user_id: Option<i64>,
    pub poll_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct BookmarkRequest {
    pub poll_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookmarkStatus {
    pub bookmarked: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

fn ensure_self(auth: &AuthContext, user_id: i64) -> ApiResult<()> {
    if auth.is(user_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Cannot access another user's bookmarks".to_string(),
        ))
    }
}

/// Whether the caller bookmarked a poll
///
/// # Errors
///
/// - `403 Forbidden`: `user_id` is not the caller
pub async fn check_bookmark(
    State(state): State<AppState>,
    auth: AuthContext,
    query: Result<Query<CheckBookmarkQuery>, QueryRejection>,
) -> ApiResult<Json<BookmarkStatus>> {
    let Query(query) = query?;
    if let Some(user_id) = query.user_id {
        ensure_self(&auth, user_id)?;
    }

    let bookmarked = state.store.is_bookmarked(auth.user_id, query.poll_id).await?;

    Ok(Json(BookmarkStatus { bookmarked }))
}

/// Bookmark a poll; repeating it is harmless
///
/// # Errors
///
/// - `404 Not Found`: No such poll
pub async fn add_bookmark(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<BookmarkRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(req) = payload?;

    state.store.add_bookmark(auth.user_id, req.poll_id).await?;

    Ok(Json(MessageResponse {
        message: "Poll bookmarked".to_string(),
    }))
}

/// Remove a bookmark if it exists
pub async fn remove_bookmark(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<BookmarkRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(req) = payload?;

    state.store.remove_bookmark(auth.user_id, req.poll_id).await?;

    Ok(Json(MessageResponse {
        message: "Bookmark removed".to_string(),
    }))
}

/// The caller's bookmarked polls, most recent first
///
/// # Errors
///
/// - `403 Forbidden`: Path user is not the caller
pub async fn list_bookmarks(
    State(state): State<AppState>,
    auth: AuthContext,
    user_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Vec<Poll>>> {
    let Path(user_id) = user_id?;
    ensure_self(&auth, user_id)?;

    Ok(Json(state.store.list_bookmarks(user_id).await?))
}
