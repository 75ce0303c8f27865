//! Voting endpoints
//!
//! - `POST /api/vote` - Cast the caller's vote (auth)
//! - `GET /api/polls/:id/vote` - Which option the caller voted for (auth)
//!
//! Votes are final; there is no endpoint to change or retract one.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use pollbox_shared::{auth::middleware::AuthContext, models::poll::Poll};
use serde::{Deserialize, Serialize};

/// Vote request
///
/// The voter is the authenticated user; a `user_id` in the body is ignored.
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub poll_id: i64,
    pub option_id: i64,
}

/// Vote response with the refreshed poll
#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    pub message: String,
    pub poll: Poll,
}

/// The caller's vote on a poll
#[derive(Debug, Serialize, Deserialize)]
pub struct MyVoteResponse {
    pub voted: bool,
    pub option_id: Option<i64>,
}

/// Cast a vote
///
/// # Errors
///
/// - `400 Bad Request`: Option does not belong to the poll
/// - `404 Not Found`: No such poll
/// - `409 Conflict`: Caller already voted on this poll
pub async fn cast_vote(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> ApiResult<Json<VoteResponse>> {
    let Json(req) = payload?;

    state
        .store
        .cast_vote(auth.user_id, req.poll_id, req.option_id)
        .await?;
    let poll = state.store.get_poll(req.poll_id).await?;

    Ok(Json(VoteResponse {
        message: "Vote recorded".to_string(),
        poll,
    }))
}

/// Report whether and how the caller voted
///
/// # Errors
///
/// - `404 Not Found`: No such poll
pub async fn my_vote(
    State(state): State<AppState>,
    auth: AuthContext,
    poll_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<MyVoteResponse>> {
    let Path(poll_id) = poll_id?;

    // 404 for unknown polls rather than "not voted"
    state.store.get_poll(poll_id).await?;
    let vote = state.store.find_vote(auth.user_id, poll_id).await?;

    Ok(Json(MyVoteResponse {
        voted: vote.is_some(),
        option_id: vote.map(|v| v.option_id),
    }))
}
