//! # banter-server
//!
//! HTTP API server for Banter workspaces.
//!
//! This binary provides:
//! - **REST API** (axum) for workspaces, channels, and messages
//! - **Keyset-paginated message history** backed by SQLite
//! - **Bearer-token sessions** resolving each request to a user and
//!   workspace
//! - **Attachment storage** for message images (uploaded files stored
//!   under random names on disk)
//! - **Per-IP and per-user rate limiting** to protect against abuse

mod api;
mod attachments;
mod auth;
mod config;
mod error;
mod rate_limit;

use std::sync::{Arc, Mutex};

use tracing::info;
use tracing_subscriber::EnvFilter;

use banter_store::Database;

use crate::api::AppState;
use crate::attachments::AttachmentStore;
use crate::config::ServerConfig;
use crate::rate_limit::{RateLimiter, WriteLimiter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,banter_server=debug")),
        )
        .init();

    info!("Starting Banter server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // SQLite database (runs migrations on open)
    let database = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    if let Some(path) = database.path() {
        info!(path = %path.display(), "Database opened");
    }
    let db = Arc::new(Mutex::new(database));

    // Attachment store (creates directory if missing)
    let attachments = Arc::new(
        AttachmentStore::new(config.attachment_path.clone(), config.max_attachment_size)
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?,
    );

    // Rate limiters: per-IP token bucket plus per-user write window
    let rate_limiter = RateLimiter::new(config.rate_limit_rps, config.rate_limit_burst);
    let write_limiter = WriteLimiter::new(config.write_limit_per_minute);

    let app_state = AppState {
        db,
        attachments,
        rate_limiter: rate_limiter.clone(),
        write_limiter: write_limiter.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    let rl = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rl.purge_stale(600.0).await;
        }
    });

    // Periodic write-window cleanup (every 5 minutes)
    let wl = write_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            wl.purge_stale().await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    // tokio::select! ensures that if either the HTTP server or a shutdown
    // signal arrives, we exit cleanly.
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
