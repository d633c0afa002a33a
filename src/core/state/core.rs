// src/core/state/core.rs

//! Defines the central `ServerState` struct, holding all shared server-wide state.

use super::stats::StatsState;
use crate::config::Config;
use crate::core::registry::Registry;
use std::sync::Arc;
use std::time::Duration;

/// The central struct holding all shared, server-wide state.
/// It is wrapped in an `Arc` and handed to every connection handler.
#[derive(Debug)]
pub struct ServerState {
    /// The server configuration. Fixed for the lifetime of the process.
    pub config: Config,
    /// The screen name registry; the only state mutated by sessions.
    pub registry: Arc<Registry>,
    /// Counters for monitoring.
    pub stats: StatsState,
}

impl ServerState {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry: Arc::new(Registry::new()),
            stats: StatsState::new(),
        })
    }

    /// The bound on a single outbound write to a peer.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.config.send_timeout_ms)
    }
}
