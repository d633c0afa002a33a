// src/server/initialization.rs

//! Handles server initialization: state setup and binding the listener.

use super::context::ServerContext;
use crate::config::Config;
use crate::core::state::ServerState;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Initializes all server components before starting the main loop.
pub async fn setup(config: Config) -> Result<ServerContext> {
    log_startup_info(&config);
    let (shutdown_tx, _) = broadcast::channel(1);

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    let local_addr = listener.local_addr()?;
    info!("RelayChat server listening on {}", local_addr);

    let connection_permits = Arc::new(Semaphore::new(config.max_clients));
    let state = ServerState::new(config);
    info!("Server state initialized.");

    Ok(ServerContext {
        state,
        listener,
        shutdown_tx,
        background_tasks: JoinSet::new(),
        connection_permits,
    })
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    info!(
        "Accepting up to {} clients, send timeout {} ms, max frame {} bytes.",
        config.max_clients, config.send_timeout_ms, config.max_frame_size
    );
    if config.reject_duplicate_names {
        info!("Duplicate screen names will be rejected.");
    } else {
        warn!("Duplicate screen names are allowed; a later START overwrites the earlier one.");
    }
}
