//! Polls and their options
//!
//! A poll is owned by the user who created it and exclusively owns its
//! options. Options are created together with the poll, keep the order they
//! were submitted in, and only ever change through the vote ledger.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE polls (
//!     id BIGSERIAL PRIMARY KEY,
//!     user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     title VARCHAR(200) NOT NULL,
//!     description TEXT NOT NULL DEFAULT '',
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp()
//! );
//!
//! CREATE TABLE options (
//!     id BIGSERIAL PRIMARY KEY,
//!     poll_id BIGINT NOT NULL REFERENCES polls(id) ON DELETE CASCADE,
//!     position INTEGER NOT NULL,
//!     text VARCHAR(200) NOT NULL,
//!     vote_count BIGINT NOT NULL DEFAULT 0,
//!     UNIQUE (poll_id, position)
//! );
//! ```
//!
//! # Example
//!
//! ```
//! use pollbox_shared::models::poll::NewPoll;
//!
//! let poll = NewPoll::new(
//!     "  Lunch?  ",
//!     "",
//!     vec!["Pizza".to_string(), "  ".to_string(), "Sushi".to_string()],
//! )
//! .unwrap();
//!
//! assert_eq!(poll.title(), "Lunch?");
//! assert_eq!(poll.options(), ["Pizza", "Sushi"]);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum number of non-empty options a poll must have
pub const MIN_OPTIONS: usize = 2;

/// Maximum number of options a poll may have
pub const MAX_OPTIONS: usize = 10;

/// Maximum title length in characters
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum description length in characters
pub const MAX_DESCRIPTION_LEN: usize = 2000;

/// Maximum option text length in characters
pub const MAX_OPTION_LEN: usize = 200;

/// Default page size for poll listings
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page size a caller may request
pub const MAX_PAGE_SIZE: u32 = 100;

/// A single answer option of a poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PollOption {
    /// Unique option ID
    pub id: i64,

    /// Poll this option belongs to
    pub poll_id: i64,

    /// Zero-based position in the poll's option list
    pub position: i32,

    /// Option text
    pub text: String,

    /// Number of votes cast for this option
    pub vote_count: i64,
}

/// A poll as returned to clients
///
/// Carries the owner's username and the total number of votes so list views
/// can render without extra lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: i64,

    /// Owner of the poll
    pub user_id: i64,

    /// Owner's username
    pub username: String,

    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,

    /// Total votes across all options
    pub vote_count: i64,

    /// Options in submission order
    pub options: Vec<PollOption>,
}

/// Validation failure for poll input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollValidationError {
    #[error("Title is required")]
    EmptyTitle,

    #[error("Title must be at most {} characters", MAX_TITLE_LEN)]
    TitleTooLong,

    #[error("Description must be at most {} characters", MAX_DESCRIPTION_LEN)]
    DescriptionTooLong,

    #[error("At least {} non-empty options are required", MIN_OPTIONS)]
    TooFewOptions,

    #[error("At most {} options are allowed", MAX_OPTIONS)]
    TooManyOptions,

    #[error("Option text must be at most {} characters", MAX_OPTION_LEN)]
    OptionTooLong,
}

/// Validated input for creating a poll
///
/// The only way to build one is [`NewPoll::new`], so a store never sees a
/// title that is blank or an option list outside `2..=10`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPoll {
    title: String,
    description: String,
    options: Vec<String>,
}

impl NewPoll {
    /// Trims and validates poll input
    ///
    /// Title, description and every option are trimmed. Options that are
    /// empty after trimming are dropped before counting.
    ///
    /// # Errors
    ///
    /// Returns a [`PollValidationError`] if the title is blank, any field is
    /// too long, or the remaining option count is outside `2..=10`.
    pub fn new(
        title: &str,
        description: &str,
        options: Vec<String>,
    ) -> Result<Self, PollValidationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(PollValidationError::EmptyTitle);
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(PollValidationError::TitleTooLong);
        }

        let description = description.trim();
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(PollValidationError::DescriptionTooLong);
        }

        let options: Vec<String> = options
            .iter()
            .map(|o| o.trim())
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        if options.len() < MIN_OPTIONS {
            return Err(PollValidationError::TooFewOptions);
        }
        if options.len() > MAX_OPTIONS {
            return Err(PollValidationError::TooManyOptions);
        }
        if options.iter().any(|o| o.chars().count() > MAX_OPTION_LEN) {
            return Err(PollValidationError::OptionTooLong);
        }

        Ok(Self {
            title: title.to_string(),
            description: description.to_string(),
            options,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Option texts in submission order
    pub fn options(&self) -> &[String] {
        &self.options
    }
}

/// Page selection for poll listings
///
/// Pages are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Builds a page request from raw query values
    ///
    /// A missing or non-positive page becomes page 1. A missing limit becomes
    /// [`DEFAULT_PAGE_SIZE`]; any other limit is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page
            .filter(|p| *p >= 1)
            .map(|p| p.min(u32::MAX as i64) as u32)
            .unwrap_or(1);
        let limit = limit
            .map(|l| l.clamp(1, MAX_PAGE_SIZE as i64) as u32)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        Self { page, limit }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of items to skip
    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of polls, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollPage {
    pub polls: Vec<Poll>,

    /// Total number of polls, independent of the page
    pub total: i64,

    pub page: u32,
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_new_poll_trims_and_drops_blank_options() {
        let poll = NewPoll::new(" Best editor ", "  vim or emacs ", opts(&["vim", " ", "emacs ", ""]))
            .unwrap();

        assert_eq!(poll.title(), "Best editor");
        assert_eq!(poll.description(), "vim or emacs");
        assert_eq!(poll.options(), ["vim", "emacs"]);
    }

    #[test]
    fn test_new_poll_requires_title() {
        let err = NewPoll::new("   ", "", opts(&["a", "b"])).unwrap_err();
        assert_eq!(err, PollValidationError::EmptyTitle);
    }

    #[test]
    fn test_new_poll_option_bounds() {
        let err = NewPoll::new("t", "", opts(&["only", "  "])).unwrap_err();
        assert_eq!(err, PollValidationError::TooFewOptions);

        let eleven: Vec<String> = (0..11).map(|i| format!("option {}", i)).collect();
        let err = NewPoll::new("t", "", eleven).unwrap_err();
        assert_eq!(err, PollValidationError::TooManyOptions);

        let ten: Vec<String> = (0..10).map(|i| format!("option {}", i)).collect();
        assert!(NewPoll::new("t", "", ten).is_ok());
    }

    #[test]
    fn test_new_poll_length_limits() {
        let long = "x".repeat(MAX_TITLE_LEN + 1);
        assert_eq!(
            NewPoll::new(&long, "", opts(&["a", "b"])).unwrap_err(),
            PollValidationError::TitleTooLong
        );

        let long_option = "y".repeat(MAX_OPTION_LEN + 1);
        assert_eq!(
            NewPoll::new("t", "", vec!["a".to_string(), long_option]).unwrap_err(),
            PollValidationError::OptionTooLong
        );
    }

    #[test]
    fn test_page_request_defaults_and_clamping() {
        let page = PageRequest::new(None, None);
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(page.offset(), 0);

        let page = PageRequest::new(Some(0), Some(0));
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), 1);

        let page = PageRequest::new(Some(-4), Some(5000));
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_page_request_offset() {
        let page = PageRequest::new(Some(2), Some(10));
        assert_eq!(page.offset(), 10);

        let page = PageRequest::new(Some(3), Some(25));
        assert_eq!(page.offset(), 50);
    }
}
