// src/client/render.rs

//! Formats incoming envelopes for the console.

use crate::core::protocol::Envelope;

pub const PROMPT: &str = "> ";

/// Renders a server-to-client envelope as one or more console lines.
/// Returns `None` for kinds a server never sends.
pub fn render(envelope: &Envelope) -> Option<String> {
    let text = match envelope {
        Envelope::Broadcast { sender, text } => format!("{sender}: {text}"),
        Envelope::Private { sender, text, .. } => format!("{sender} (private): {text}"),
        Envelope::Join { name } => format!("{name} has joined the chat"),
        Envelope::Leave { name } => format!("{name} has left the chat"),
        Envelope::UserList { names } => {
            let mut lines = String::from("Connected users:");
            for name in names {
                lines.push('\n');
                lines.push_str(name);
            }
            lines
        }
        Envelope::Error { message } => format!("Error: {message}"),
        Envelope::Start { .. } | Envelope::Exit { .. } => return None,
    };
    Some(text)
}
