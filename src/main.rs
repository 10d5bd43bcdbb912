// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Submission Guard Service
//!
//! Decision service for form backends. The backend posts
//! `{form_id, client_addr}` to `/evaluate` before processing a submission and
//! refuses the submission when the answer has `allowed: false`.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `SUBMISSIONS_PER_HOUR`: Accepted submissions per client per form (default: 10)
//! - `WINDOW_SECS`: Rate window in seconds (default: 3600)
//! - `TOKEN_TTL_SECS`: Submission token lifetime in seconds (default: 600)
//! - `STORE_TIMEOUT_MS`: Store call timeout in milliseconds (default: 2000)
//! - `LOCK_SHARDS`: Bucket lock shards (default: 64)
//! - `FAILURE_POLICY`: `closed` or `open` on store failure (default: closed)
//! - `GUARD_SECRET`: 64 hex characters; random per process when unset
//! - `ADMIN_TOKEN`: Bearer token enabling `PUT /config/limit`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use submission_guard::{
    config::Config,
    guard::SubmissionGuard,
    handlers::{router, AppState},
    store::MemoryStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        bind_addr = %config.bind_addr,
        submissions_per_hour = config.guard.submissions_per_hour,
        window_secs = config.guard.window_secs,
        token_ttl_secs = config.guard.token_ttl_secs,
        failure_policy = ?config.guard.failure_policy,
        admin_enabled = config.admin.token.is_some(),
        "Starting submission guard"
    );
    if config.guard.secret.is_none() {
        warn!("GUARD_SECRET unset, using a per-process secret; tokens will not survive a restart");
    }

    // Create application state
    let store = Arc::new(MemoryStore::new());
    let guard = SubmissionGuard::new(&config.guard, store.clone())?;
    let state = Arc::new(AppState::new(config.clone(), guard)?);

    // Spawn cleanup task
    let cleanup_store = store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            cleanup_store.purge_expired();
        }
    });

    let app = router(state);

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
