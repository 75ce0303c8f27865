//! Authentication primitives
//!
//! # Modules
//!
//! - [`password`]: Argon2id password hashing and verification
//! - [`jwt`]: Access/refresh session tokens (HS256)
//! - [`middleware`]: Bearer authentication and the [`AuthContext`](middleware::AuthContext) extractor

pub mod jwt;
pub mod middleware;
pub mod password;
