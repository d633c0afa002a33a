// src/client/input.rs

//! Turns console lines into outgoing envelopes.

use crate::core::protocol::Envelope;
use thiserror::Error;

/// The literal line that ends the session.
pub const EXIT_COMMAND: &str = "!exit";

/// What the user asked for with one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    Broadcast(String),
    Private { recipient: String, text: String },
    Exit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Usage: @name message (no message given for {0})")]
    MissingText(String),
    #[error("Usage: @name message (no recipient given)")]
    MissingRecipient,
}

/// Parses one console line.
///
/// `@name text` is a private message to `name`, split on the first space;
/// `!exit` leaves; anything else is broadcast as typed.
pub fn parse_line(line: &str) -> Result<InputCommand, InputError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line == EXIT_COMMAND {
        return Ok(InputCommand::Exit);
    }

    let Some(rest) = line.strip_prefix('@') else {
        return Ok(InputCommand::Broadcast(line.to_string()));
    };
    let Some((recipient, text)) = rest.split_once(' ') else {
        return Err(if rest.is_empty() {
            InputError::MissingRecipient
        } else {
            InputError::MissingText(rest.to_string())
        });
    };
    if recipient.is_empty() {
        return Err(InputError::MissingRecipient);
    }
    Ok(InputCommand::Private {
        recipient: recipient.to_string(),
        text: text.to_string(),
    })
}

impl InputCommand {
    /// Builds the client-to-server envelope, stamped with our screen name.
    pub fn into_envelope(self, screen_name: &str) -> Envelope {
        match self {
            InputCommand::Broadcast(text) => Envelope::Broadcast {
                sender: screen_name.to_string(),
                text,
            },
            InputCommand::Private { recipient, text } => Envelope::Private {
                sender: screen_name.to_string(),
                text,
                recipient: Some(recipient),
            },
            InputCommand::Exit => Envelope::Exit {
                name: screen_name.to_string(),
            },
        }
    }
}
