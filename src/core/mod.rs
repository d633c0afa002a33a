// src/core/mod.rs

//! Protocol, shared state, and routing for the chat relay.

pub mod errors;
pub mod metrics;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod state;

pub use errors::RelayError;
pub use protocol::Envelope;
pub use registry::Registry;
pub use router::Router;
