// src/connection/session.rs

//! Defines the state associated with a single client session.

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Accepted, no screen name bound yet.
    Anonymous,
    /// START processed; the name is in the registry.
    Active { name: String },
    /// Terminal. The connection is being or has been closed.
    Closed,
}

/// Holds the state specific to a single client session.
#[derive(Debug)]
pub struct SessionState {
    pub phase: SessionPhase,
    /// Frames read from the peer, well-formed or not.
    pub frames_received: u64,
    /// Frames dropped because they could not be decoded or were out of place.
    pub frames_dropped: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            phase: SessionPhase::Anonymous,
            frames_received: 0,
            frames_dropped: 0,
        }
    }

    /// The bound screen name while the session is active.
    pub fn screen_name(&self) -> Option<&str> {
        match &self.phase {
            SessionPhase::Active { name } => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, SessionPhase::Active { .. })
    }
}
