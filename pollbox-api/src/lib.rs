//! # Pollbox API Server Library
//!
//! REST backend for polls, votes and bookmarks.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration from the environment
//! - `error`: Error type and HTTP response mapping
//! - `middleware`: Security headers
//! - `routes`: Route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
