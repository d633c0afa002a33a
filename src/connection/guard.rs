// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection resource management.

use crate::core::metrics;
use crate::core::state::ServerState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, warn};

/// An RAII guard to ensure connection resources are always cleaned up when a
/// connection handler's scope is exited, including by panic.
pub struct ConnectionGuard {
    /// A shared reference to the server state.
    pub(crate) state: Arc<ServerState>,
    /// The unique identifier for the client session.
    pub(crate) session_id: u64,
    /// The network address of the client.
    pub(crate) addr: SocketAddr,
    /// The screen name this session registered, if any.
    pub(crate) bound_name: Option<String>,
    /// Held for the lifetime of the connection to enforce `max_clients`.
    _permit: Option<OwnedSemaphorePermit>,
}

impl ConnectionGuard {
    /// Creates a new `ConnectionGuard`.
    pub(crate) fn new(
        state: Arc<ServerState>,
        session_id: u64,
        addr: SocketAddr,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        metrics::CONNECTED_CLIENTS.inc();
        Self {
            state,
            session_id,
            addr,
            bound_name: None,
            _permit: permit,
        }
    }

    /// Records the name registered by this session.
    pub(crate) fn bind(&mut self, name: &str) {
        self.bound_name = Some(name.to_string());
    }

    /// Called once the handler has performed its own (async) cleanup.
    pub(crate) fn release(&mut self) {
        self.bound_name = None;
    }
}

impl Drop for ConnectionGuard {
    /// Performs resource cleanup when the guard goes out of scope.
    fn drop(&mut self) {
        metrics::CONNECTED_CLIENTS.dec();
        debug!(
            "ConnectionGuard dropping, cleaning up resources for connection {}",
            self.addr
        );

        // Only reached with a name still bound if the handler never got to run
        // its cleanup. No LEAVE can be sent from here.
        if let Some(name) = self.bound_name.take()
            && self
                .state
                .registry
                .remove_if_owner(&name, self.session_id)
                .is_some()
        {
            warn!(
                "Removed stale registration '{}' for {} without a LEAVE notification.",
                name, self.addr
            );
        }
    }
}
