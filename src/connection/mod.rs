// src/connection/mod.rs

//! Manages the lifecycle of a single client TCP connection: frame decoding,
//! the per-session state machine, and registry cleanup.

mod guard;
mod handler;
mod session;

pub use guard::ConnectionGuard;
pub use handler::ConnectionHandler;
pub use session::{SessionPhase, SessionState};
