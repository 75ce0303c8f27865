//! Configuration management for the API server
//!
//! Configuration comes from environment variables, with a `.env` file loaded
//! first if present.
//!
//! # Environment Variables
//!
//! - `API_HOST`: Host to bind to (default: 0.0.0.0)
//! - `API_PORT`: Port to bind to (default: 8080)
//! - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any
//!   (default: http://localhost:5173)
//! - `PRODUCTION`: Enables HSTS when `true` (default: false)
//! - `STORAGE_BACKEND`: `postgres` or `memory` (default: postgres)
//! - `DATABASE_URL`: PostgreSQL connection string (required for postgres)
//! - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
//! - `JWT_SECRET`: Token signing secret, at least 32 characters (required)
//!
//! # Example
//!
//! ```no_run
//! use pollbox_api::config::Config;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! println!("Server will listen on {}", config.bind_address());
//! # Ok(())
//! # }
//! ```

use anyhow::{bail, Context};
use std::env;

const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub jwt: JwtConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any origin
    pub cors_origins: Vec<String>,

    /// Production mode adds HSTS
    pub production: bool,
}

/// Where polls are stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Postgres { url: String, max_connections: u32 },
    Memory,
}

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// HMAC secret for signing session tokens
    ///
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig").field("secret", &"<redacted>").finish()
    }
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds configuration from any variable lookup
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`]
    pub fn from_vars<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let host = get("API_HOST", "0.0.0.0");
        let port = get("API_PORT", "8080")
            .parse::<u16>()
            .context("API_PORT must be a port number")?;

        let cors_origins: Vec<String> = get("CORS_ORIGINS", DEFAULT_CORS_ORIGIN)
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let production = match get("PRODUCTION", "false").to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            other => bail!("PRODUCTION must be true or false, got {}", other),
        };

        let storage = match get("STORAGE_BACKEND", "postgres").to_ascii_lowercase().as_str() {
            "postgres" => {
                let url = lookup("DATABASE_URL")
                    .context("DATABASE_URL environment variable is required")?;
                let max_connections = get("DATABASE_MAX_CONNECTIONS", "10")
                    .parse::<u32>()
                    .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;
                if max_connections == 0 {
                    bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
                }
                StorageConfig::Postgres {
                    url,
                    max_connections,
                }
            }
            "memory" => StorageConfig::Memory,
            other => bail!("STORAGE_BACKEND must be postgres or memory, got {}", other),
        };

        let secret =
            lookup("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if secret.len() < 32 {
            bail!("JWT_SECRET must be at least 32 characters long");
        }

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
                production,
            },
            storage,
            jwt: JwtConfig { secret },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/pollbox"),
            ("JWT_SECRET", SECRET),
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.api.cors_origins, ["http://localhost:5173"]);
        assert!(!config.api.production);
        assert_eq!(
            config.storage,
            StorageConfig::Postgres {
                url: "postgresql://localhost/pollbox".to_string(),
                max_connections: 10,
            }
        );
    }

    #[test]
    fn test_memory_backend_needs_no_database_url() {
        let config = load(&[
            ("STORAGE_BACKEND", "memory"),
            ("JWT_SECRET", SECRET),
            ("API_PORT", "9000"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
            ("PRODUCTION", "true"),
        ])
        .unwrap();

        assert_eq!(config.storage, StorageConfig::Memory);
        assert_eq!(config.api.port, 9000);
        assert_eq!(
            config.api.cors_origins,
            ["https://a.example", "https://b.example"]
        );
        assert!(config.api.production);
    }

    #[test]
    fn test_missing_or_invalid_values_fail() {
        assert!(load(&[("JWT_SECRET", SECRET)]).is_err());
        assert!(load(&[("STORAGE_BACKEND", "memory")]).is_err());
        assert!(load(&[("STORAGE_BACKEND", "memory"), ("JWT_SECRET", "short")]).is_err());
        assert!(load(&[("STORAGE_BACKEND", "sqlite"), ("JWT_SECRET", SECRET)]).is_err());
        assert!(load(&[
            ("STORAGE_BACKEND", "memory"),
            ("JWT_SECRET", SECRET),
            ("API_PORT", "http"),
        ])
        .is_err());
    }

    #[test]
    fn test_secret_is_not_debug_printed() {
        let config = load(&[("STORAGE_BACKEND", "memory"), ("JWT_SECRET", SECRET)]).unwrap();
        assert!(!format!("{:?}", config).contains(SECRET));
    }
}
