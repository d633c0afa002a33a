// src/server/connection_loop.rs

//! Contains the main server loop for accepting connections and handling graceful shutdown.

use super::context::ServerContext;
use crate::connection::ConnectionHandler;
use crate::core::metrics;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// How long shutdown waits for sessions and background tasks to finish.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// The main server loop. Accepts connections until `shutdown` resolves or a
/// background task fails, then tears every session down.
pub async fn run<F>(mut ctx: ServerContext, shutdown: F)
where
    F: Future<Output = ()> + Send,
{
    let mut session_id_counter: u64 = 0;
    let mut client_tasks = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("Shutdown requested, initiating graceful shutdown.");
                break;
            }

            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => warn!("A background task finished unexpectedly without an error."),
                    Ok(Err(e)) => { error!("CRITICAL: Background task failed: {}. Shutting down.", e); break; }
                    Err(e) => { error!("CRITICAL: Background task panicked: {e:?}. Shutting down."); break; }
                }
            },

            res = ctx.listener.accept() => {
                match res {
                    Ok((socket, addr)) => match ctx.connection_permits.clone().try_acquire_owned() {
                        Ok(permit) => {
                            info!("Accepted new connection from: {}", addr);
                            ctx.state.stats.increment_total_connections();
                            metrics::CONNECTIONS_RECEIVED_TOTAL.inc();
                            if let Err(e) = socket.set_nodelay(true) {
                                debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
                            }

                            session_id_counter = session_id_counter.wrapping_add(1);
                            let session_id = session_id_counter;
                            let state_clone = ctx.state.clone();
                            let global_shutdown_rx = ctx.shutdown_tx.subscribe();

                            client_tasks.spawn(async move {
                                let mut handler = ConnectionHandler::new(socket, addr, state_clone, session_id, global_shutdown_rx)
                                    .with_permit(permit);
                                if let Err(e) = handler.run().await {
                                    warn!("Connection from {} terminated unexpectedly: {}", addr, e);
                                }
                            });
                        }
                        Err(_) => {
                            warn!("Client limit reached, closing connection from {}.", addr);
                            drop(socket);
                        }
                    },
                    Err(e) => error!("Failed to accept connection: {}", e),
                }
            },

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("A client handler panicked: {e:?}");
                }
            },
        }
    }

    info!("Shutting down. Sending signal to all tasks.");
    if ctx.shutdown_tx.send(()).is_err() {
        debug!("No task was listening for the shutdown signal.");
    }

    if tokio::time::timeout(SHUTDOWN_GRACE, async {
        while client_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for client connections to close.");
        client_tasks.shutdown().await;
    }
    info!("All client connections closed.");

    if tokio::time::timeout(SHUTDOWN_GRACE, async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for background tasks to finish cleanly.");
    };
    let stats = &ctx.state.stats;
    info!(
        "Server shutdown complete. Served {} connections, {} envelopes received, {} delivered.",
        stats.get_total_connections(),
        stats.get_envelopes_received(),
        stats.get_envelopes_delivered()
    );
}
