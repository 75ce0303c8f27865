//! PostgreSQL plumbing
//!
//! - `pool`: connection pool with health check
//! - `migrations`: embedded schema migrations and status
//!
//! Queries themselves live in [`crate::store::postgres`].

pub mod migrations;
pub mod pool;
