//! # Pollbox API Server
//!
//! Serves the polling REST API.
//!
//! ## Usage
//!
//! ```bash
//! STORAGE_BACKEND=memory JWT_SECRET=$(openssl rand -hex 32) cargo run -p pollbox-api
//! ```
//!
//! Set `LOG_FORMAT=json` for JSON logs and `RUST_LOG` to adjust filtering.

use anyhow::Context;
use pollbox_api::{
    app::{build_router, AppState},
    config::{Config, StorageConfig},
};
use pollbox_shared::{
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    store::{MemoryStore, PgStore, PollStore},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "pollbox_api=debug,pollbox_shared=debug,tower_http=debug".into()
    });

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env may set LOG_FORMAT, so load it before tracing
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("Pollbox API v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("Invalid configuration")?;

    let (store, pool) = match &config.storage {
        StorageConfig::Postgres {
            url,
            max_connections,
        } => {
            let pool = create_pool(DatabaseConfig {
                url: url.clone(),
                max_connections: *max_connections,
                ..Default::default()
            })
            .await
            .context("Failed to connect to PostgreSQL")?;

            run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;

            (
                Arc::new(PgStore::new(pool.clone())) as Arc<dyn PollStore>,
                Some(pool),
            )
        }
        StorageConfig::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            (Arc::new(MemoryStore::new()) as Arc<dyn PollStore>, None)
        }
    };

    let bind_address = config.bind_address();
    let app = build_router(AppState::new(store, config));

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!(address = %bind_address, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(pool) = pool {
        close_pool(pool).await;
    }

    tracing::info!("Server stopped");
    Ok(())
}
