//! # Pollbox Shared Library
//!
//! Domain types, storage and auth primitives used by the Pollbox API server.
//!
//! ## Module Organization
//!
//! - `models`: Users, polls, options, votes and bookmarks
//! - `store`: The `PollStore` port with PostgreSQL and in-memory backends
//! - `auth`: Password hashing, session tokens and bearer authentication
//! - `db`: Connection pool and migrations

pub mod auth;
pub mod db;
pub mod models;
pub mod store;

/// Current version of the Pollbox shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
