//! Poll endpoints
//!
//! # Endpoints
//!
//! - `GET /api/polls?page=N&limit=M` - Page of polls, newest first
//! - `GET /api/polls/:id` - One poll with options and counts
//! - `GET /api/user/:id/polls` - Polls created by a user
//! - `POST /api/polls` - Create a poll (auth)
//! - `DELETE /api/polls/:id` - Delete an owned poll (auth)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use pollbox_shared::{
    auth::middleware::AuthContext,
    models::poll::{NewPoll, PageRequest, Poll, PollPage},
};
use serde::Deserialize;

/// Query string for poll listings
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Create poll request
///
/// Unknown fields such as a client-sent `user_id` are ignored; the owner
/// is always the authenticated user.
#[derive(Debug, Deserialize)]
pub struct CreatePollRequest {
    pub title: String,

    #[serde(default)]
    pub description: String,

    pub options: Vec<String>,
}

/// List polls, newest first
///
/// Missing or invalid `page` means page 1; `limit` defaults to 10 and is
/// clamped to 1..=100.
pub async fn list_polls(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<PollPage>> {
    let Query(query) = query?;
    let page = PageRequest::new(query.page, query.limit);

    Ok(Json(state.store.list_polls(page).await?))
}

/// Get one poll
///
/// # Errors
///
/// - `404 Not Found`: No such poll
pub async fn get_poll(
    State(state): State<AppState>,
    poll_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Poll>> {
    let Path(poll_id) = poll_id?;

    Ok(Json(state.store.get_poll(poll_id).await?))
}

/// Polls created by a user, newest first
///
/// An unknown user simply has no polls.
pub async fn list_user_polls(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Vec<Poll>>> {
    let Path(user_id) = user_id?;

    Ok(Json(state.store.list_polls_by_user(user_id).await?))
}

/// Create a poll owned by the caller
///
/// ```text
/// POST /api/polls
/// Authorization: Bearer <access token>
///
/// { "title": "Lunch?", "description": "", "options": ["Pizza", "Sushi"] }
/// ```
///
/// Responds `201 Created` with the new poll.
///
/// # Errors
///
/// - `400 Bad Request`: Blank title, fewer than 2 or more than 10
///   non-empty options, or over-long fields
pub async fn create_poll(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<CreatePollRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Poll>)> {
    let Json(req) = payload?;

    let new_poll = NewPoll::new(&req.title, &req.description, req.options)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let poll = state.store.create_poll(auth.user_id, &new_poll).await?;

    Ok((StatusCode::CREATED, Json(poll)))
}

/// Delete a poll the caller owns
///
/// Options, votes and bookmarks of the poll are removed with it.
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not the owner
/// - `404 Not Found`: No such poll
pub async fn delete_poll(
    State(state): State<AppState>,
    auth: AuthContext,
    poll_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(poll_id) = poll_id?;

    state.store.delete_poll(poll_id, auth.user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
