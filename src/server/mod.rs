// src/server/mod.rs

use crate::config::Config;
use anyhow::Result;
use std::future::Future;
use tracing::{info, warn};

mod connection_loop;
mod context;
mod initialization;
mod metrics_server;
mod spawner;

pub use context::ServerContext;
pub use initialization::setup;

/// The main server startup function. Runs until SIGINT or SIGTERM.
pub async fn run(config: Config) -> Result<()> {
    let server_context = setup(config).await?;
    serve(server_context, shutdown_signal()).await
}

/// Spawns background tasks and runs the accept loop until `shutdown` resolves.
pub async fn serve<F>(mut server_context: ServerContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    // 1. Spawn all background tasks.
    spawner::spawn_all(&mut server_context)?;

    // 2. Start the main connection acceptance loop. This function will run until shutdown.
    connection_loop::run(server_context, shutdown).await;

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("SIGINT received.");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("SIGTERM received.");
            }
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {}", e);
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
}
