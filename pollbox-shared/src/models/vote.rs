//! Votes
//!
//! A vote records which option a user picked on a poll. There is at most one
//! vote per (user, poll) and votes are never changed or retracted.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE votes (
//!     id BIGSERIAL PRIMARY KEY,
//!     user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     poll_id BIGINT NOT NULL REFERENCES polls(id) ON DELETE CASCADE,
//!     option_id BIGINT NOT NULL REFERENCES options(id) ON DELETE CASCADE,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp(),
//!     UNIQUE (user_id, poll_id)
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cast vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
    pub id: i64,
    pub user_id: i64,
    pub poll_id: i64,
    pub option_id: i64,

    /// When the vote was cast
    pub created_at: DateTime<Utc>,
}
