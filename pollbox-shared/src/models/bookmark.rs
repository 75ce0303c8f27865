//! Bookmarks
//!
//! A bookmark is a (user, poll) pair. Bookmarks form a set: adding the same
//! pair twice leaves a single row.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE bookmarks (
//!     user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     poll_id BIGINT NOT NULL REFERENCES polls(id) ON DELETE CASCADE,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp(),
//!     PRIMARY KEY (user_id, poll_id)
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's bookmark on a poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bookmark {
    pub user_id: i64,
    pub poll_id: i64,

    /// When the poll was bookmarked; listings are ordered by this, newest first
    pub created_at: DateTime<Utc>,
}
