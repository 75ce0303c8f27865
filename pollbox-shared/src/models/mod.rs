//! Domain models
//!
//! Plain data types shared by every store implementation and the API.
//!
//! # Models
//!
//! - `user`: Registered accounts and their public identity
//! - `poll`: Polls, options, validated poll input and pagination
//! - `vote`: One vote per user per poll
//! - `bookmark`: User/poll bookmark pairs

pub mod bookmark;
pub mod poll;
pub mod user;
pub mod vote;
