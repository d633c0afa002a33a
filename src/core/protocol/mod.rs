// src/core/protocol/mod.rs

//! The chat wire protocol: length-prefixed frames carrying JSON-array envelopes.

pub mod envelope;
pub mod frame;
pub use envelope::{Envelope, Kind};
pub use frame::{DEFAULT_MAX_FRAME_SIZE, FrameCodec, read_envelope, read_frame};
