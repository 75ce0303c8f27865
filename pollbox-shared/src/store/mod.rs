//! Persistence port for users, polls, votes and bookmarks
//!
//! [`PollStore`] is the single seam between the HTTP layer and storage.
//! Two implementations exist:
//!
//! - [`postgres::PgStore`]: PostgreSQL via sqlx, used in production
//! - [`memory::MemoryStore`]: in-process state behind an async lock, used by
//!   tests and `STORAGE_BACKEND=memory`
//!
//! Both enforce the same rules: one vote per (user, poll), counters that
//! never lose increments, bookmarks as a set, owner-only poll deletion.

use async_trait::async_trait;

use crate::models::{
    poll::{NewPoll, PageRequest, Poll, PollPage, PollValidationError},
    user::{CreateUser, User},
    vote::Vote,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Domain error returned by every store operation
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Input violates a domain rule (bad poll shape, option not in poll)
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation (duplicate email/username, second vote)
    #[error("{0}")]
    Conflict(String),

    /// Caller may not act on the resource
    #[error("{0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<PollValidationError> for StoreError {
    fn from(err: PollValidationError) -> Self {
        StoreError::Validation(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub(crate) fn poll_not_found(poll_id: i64) -> StoreError {
    StoreError::NotFound(format!("Poll {} not found", poll_id))
}

pub(crate) fn user_not_found(user_id: i64) -> StoreError {
    StoreError::NotFound(format!("User {} not found", user_id))
}

pub(crate) fn already_voted() -> StoreError {
    StoreError::Conflict("You have already voted on this poll".to_string())
}

pub(crate) fn option_not_in_poll(option_id: i64, poll_id: i64) -> StoreError {
    StoreError::Validation(format!(
        "Option {} does not belong to poll {}",
        option_id, poll_id
    ))
}

/// Storage operations behind the API
///
/// Implementations are shared across request handlers, so they must be
/// cheap to clone behind an `Arc` and safe to call concurrently.
#[async_trait]
pub trait PollStore: Send + Sync {
    /// Short backend name reported by the health endpoint
    fn backend(&self) -> &'static str;

    /// Verifies the backend is reachable
    async fn health_check(&self) -> StoreResult<()>;

    /// Inserts a user
    ///
    /// # Errors
    ///
    /// `StoreError::Conflict` if the email or username is taken
    async fn create_user(&self, user: CreateUser) -> StoreResult<User>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_id(&self, user_id: i64) -> StoreResult<Option<User>>;

    /// Creates a poll and its zero-vote options in one atomic step
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the owner does not exist
    async fn create_poll(&self, owner_id: i64, poll: &NewPoll) -> StoreResult<Poll>;

    /// Loads a poll with options in position order and current counts
    async fn get_poll(&self, poll_id: i64) -> StoreResult<Poll>;

    /// One page of polls, newest first, ties broken by id descending
    async fn list_polls(&self, page: PageRequest) -> StoreResult<PollPage>;

    /// Polls owned by `user_id`, newest first
    async fn list_polls_by_user(&self, user_id: i64) -> StoreResult<Vec<Poll>>;

    /// Deletes a poll with its options, votes and bookmarks
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the poll does not exist
    /// - `StoreError::Forbidden` if `requester_id` is not the owner
    async fn delete_poll(&self, poll_id: i64, requester_id: i64) -> StoreResult<()>;

    /// Records a vote and increments the option's counter atomically
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the poll does not exist
    /// - `StoreError::Validation` if the option is not part of the poll
    /// - `StoreError::Conflict` if the user already voted on the poll
    async fn cast_vote(&self, user_id: i64, poll_id: i64, option_id: i64) -> StoreResult<Vote>;

    /// The user's vote on a poll, if any
    async fn find_vote(&self, user_id: i64, poll_id: i64) -> StoreResult<Option<Vote>>;

    async fn is_bookmarked(&self, user_id: i64, poll_id: i64) -> StoreResult<bool>;

    /// Bookmarks a poll; bookmarking twice is a no-op
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the poll does not exist
    async fn add_bookmark(&self, user_id: i64, poll_id: i64) -> StoreResult<()>;

    /// Removes a bookmark if present
    async fn remove_bookmark(&self, user_id: i64, poll_id: i64) -> StoreResult<()>;

    /// Bookmarked polls, most recently bookmarked first
    async fn list_bookmarks(&self, user_id: i64) -> StoreResult<Vec<Poll>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_validation_maps_to_validation() {
        let err: StoreError = PollValidationError::TooFewOptions.into();
        assert!(matches!(err, StoreError::Validation(ref m) if m.contains("At least 2")));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(poll_not_found(4).to_string(), "Poll 4 not found");
        assert_eq!(
            option_not_in_poll(9, 4).to_string(),
            "Option 9 does not belong to poll 4"
        );
    }
}
