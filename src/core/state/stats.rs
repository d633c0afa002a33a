// src/core/state/stats.rs

//! Contains state definitions and logic for server statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Holds all state and logic related to server-wide statistics and monitoring.
#[derive(Debug)]
pub struct StatsState {
    /// The total number of connections accepted by the server since startup.
    total_connections: AtomicU64,
    /// The total number of envelopes read from clients since startup.
    total_envelopes_received: AtomicU64,
    /// The total number of envelopes written to recipients since startup.
    total_envelopes_delivered: AtomicU64,
}

impl Default for StatsState {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsState {
    /// Creates a new `StatsState` with initialized counters.
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            total_envelopes_received: AtomicU64::new(0),
            total_envelopes_delivered: AtomicU64::new(0),
        }
    }

    /// Atomically increments the total number of connections received.
    pub fn increment_total_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the total number of connections received.
    pub fn get_total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    pub fn increment_envelopes_received(&self) {
        self.total_envelopes_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_envelopes_received(&self) -> u64 {
        self.total_envelopes_received.load(Ordering::Relaxed)
    }

    pub fn add_envelopes_delivered(&self, count: u64) {
        self.total_envelopes_delivered
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn get_envelopes_delivered(&self) -> u64 {
        self.total_envelopes_delivered.load(Ordering::Relaxed)
    }
}
