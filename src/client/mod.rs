// src/client/mod.rs

//! The interactive console client.

pub mod input;
pub mod render;
pub mod session;

pub use input::{InputCommand, InputError, parse_line};
pub use session::{ClientConfig, SessionEnd, run, run_session};
