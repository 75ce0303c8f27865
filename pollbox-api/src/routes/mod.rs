//! API route handlers, by resource
//!
//! - `health`: Health check
//! - `auth`: Register, login, refresh, current identity
//! - `polls`: Poll listing, lookup, creation and deletion
//! - `votes`: Casting and reading the caller's vote
//! - `bookmarks`: The caller's bookmark set

pub mod auth;
pub mod bookmarks;
pub mod health;
pub mod polls;
pub mod votes;
