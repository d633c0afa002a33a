// src/core/metrics.rs

//! Defines and registers Prometheus metrics for server monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, TextEncoder, register_counter, register_counter_vec,
    register_gauge,
};

lazy_static! {
    // --- Server-wide Gauges ---
    /// The number of TCP connections currently open.
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("relaychat_connected_clients", "Number of currently connected clients.").unwrap();
    /// The number of screen names currently in the registry.
    pub static ref REGISTERED_USERS: Gauge =
        register_gauge!("relaychat_registered_users", "Number of screen names currently registered.").unwrap();

    // --- Server-wide Counters ---
    /// The total number of connections accepted by the server since startup.
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("relaychat_connections_received_total", "Total number of connections received.").unwrap();
    /// Envelopes written to recipients, labeled by kind.
    pub static ref ENVELOPES_ROUTED_TOTAL: CounterVec =
        register_counter_vec!("relaychat_envelopes_routed_total", "Total number of envelopes delivered, labeled by kind.", &["kind"]).unwrap();
    /// Deliveries that failed and caused the recipient to be evicted.
    pub static ref DELIVERY_FAILURES_TOTAL: Counter =
        register_counter!("relaychat_delivery_failures_total", "Total number of failed deliveries.").unwrap();
    /// Frames that were received intact but could not be decoded.
    pub static ref DROPPED_FRAMES_TOTAL: Counter =
        register_counter!("relaychat_dropped_frames_total", "Total number of malformed frames dropped.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
