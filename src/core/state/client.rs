// src/core/state/client.rs

//! Contains state definitions related to client connections.

use crate::core::RelayError;
use std::fmt;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, broadcast};

pub type ShutdownSender = broadcast::Sender<()>;
/// The write half of a client connection, type-erased so tests can plug in
/// in-memory streams.
pub type ClientWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// A cloneable (via `Arc`) handle to a live connection, stored in the registry.
///
/// Holding a handle never holds the registry lock: writers lock only this
/// connection's own writer, so a slow peer stalls nobody but itself.
pub struct ClientHandle {
    pub session_id: u64,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    writer: Mutex<ClientWriter>,
    kill_tx: ShutdownSender,
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("session_id", &self.session_id)
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

impl ClientHandle {
    pub fn new(
        session_id: u64,
        addr: SocketAddr,
        writer: ClientWriter,
        kill_tx: ShutdownSender,
    ) -> Self {
        Self {
            session_id,
            addr,
            connected_at: Instant::now(),
            writer: Mutex::new(writer),
            kill_tx,
        }
    }

    /// Writes one pre-encoded frame to the peer, giving up after `timeout`.
    pub async fn send_frame(&self, frame: &[u8], timeout: Duration) -> Result<(), RelayError> {
        tokio::time::timeout(timeout, async {
            let mut writer = self.writer.lock().await;
            writer.write_all(frame).await?;
            writer.flush().await?;
            Ok::<(), RelayError>(())
        })
        .await?
    }

    /// Shuts down the write side of the connection.
    pub async fn close(&self) {
        let _ = self.writer.lock().await.shutdown().await;
    }

    /// Tells the owning session to stop reading and tear down.
    pub fn kill(&self) {
        let _ = self.kill_tx.send(());
    }
}
