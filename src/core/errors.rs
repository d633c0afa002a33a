// src/core/errors.rs

//! Defines the primary error type for the relay server and client.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the relay.
/// Using `thiserror` allows for clean error definitions and automatic `From` trait implementations.
#[derive(Error, Debug, Clone)]
pub enum RelayError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    /// The stream ended or was cut off in the middle of a frame, or announced
    /// a frame the codec refuses to buffer.
    #[error("Framing error: {0}")]
    Framing(String),

    /// The frame arrived intact but its payload is not a valid envelope.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unknown message kind '{0}'")]
    UnknownKind(String),

    #[error("Wrong number of fields for '{kind}': expected {expected}, got {actual}")]
    WrongArity {
        kind: String,
        expected: &'static str,
        actual: usize,
    },

    /// The display text doubles as the ERROR envelope sent back to the sender.
    #[error("Recipient {0} not found")]
    RecipientNotFound(String),

    #[error("Screen name {0} is already in use")]
    NameInUse(String),

    #[error("Timed out delivering to peer")]
    SendTimeout,
}

impl RelayError {
    /// Returns true for errors that only invalidate a single frame. The session
    /// that received it keeps running.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RelayError::Protocol(_) | RelayError::UnknownKind(_) | RelayError::WrongArity { .. }
        )
    }

    /// Returns true if the error means the peer is gone (closed, reset or truncated).
    pub fn is_disconnect(&self) -> bool {
        match self {
            RelayError::Framing(_) => true,
            RelayError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

impl PartialEq for RelayError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RelayError::Io(e1), RelayError::Io(e2)) => e1.kind() == e2.kind(),
            (RelayError::Framing(s1), RelayError::Framing(s2)) => s1 == s2,
            (RelayError::Protocol(s1), RelayError::Protocol(s2)) => s1 == s2,
            (RelayError::UnknownKind(s1), RelayError::UnknownKind(s2)) => s1 == s2,
            (
                RelayError::WrongArity {
                    kind: k1,
                    expected: e1,
                    actual: a1,
                },
                RelayError::WrongArity {
                    kind: k2,
                    expected: e2,
                    actual: a2,
                },
            ) => k1 == k2 && e1 == e2 && a1 == a2,
            (RelayError::RecipientNotFound(s1), RelayError::RecipientNotFound(s2)) => s1 == s2,
            (RelayError::NameInUse(s1), RelayError::NameInUse(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for RelayError {
    fn from(e: std::io::Error) -> Self {
        RelayError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Protocol(format!("invalid JSON payload: {e}"))
    }
}

impl From<std::str::Utf8Error> for RelayError {
    fn from(_: std::str::Utf8Error) -> Self {
        RelayError::Protocol("payload is not valid UTF-8".to_string())
    }
}

impl From<tokio::time::error::Elapsed> for RelayError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        RelayError::SendTimeout
    }
}
