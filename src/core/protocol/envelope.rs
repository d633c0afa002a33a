// src/core/protocol/envelope.rs

//! The typed message carried by every frame, and its JSON-array payload form.

use super::frame::FrameCodec;
use crate::core::RelayError;
use bytes::{Bytes, BytesMut};
use serde_json::Value;
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};
use tokio_util::codec::Encoder;

/// The tag in the first slot of every payload array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Kind {
    Start,
    Broadcast,
    Private,
    Exit,
    Join,
    Leave,
    UserList,
    Error,
}

/// One protocol message. A single type covers both directions; only `Private`
/// differs in shape, carrying a recipient on the way in and none on the way out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// `["START", name]`, client to server.
    Start { name: String },
    /// `["BROADCAST", sender, text]`, both directions.
    Broadcast { sender: String, text: String },
    /// `["PRIVATE", sender, text, recipient]` client to server,
    /// `["PRIVATE", sender, text]` server to client.
    Private {
        sender: String,
        text: String,
        recipient: Option<String>,
    },
    /// `["EXIT", name]`, client to server.
    Exit { name: String },
    /// `["JOIN", name]`, server to client.
    Join { name: String },
    /// `["LEAVE", name]`, server to client.
    Leave { name: String },
    /// `["USER_LIST", [names...]]`, server to client.
    UserList { names: Vec<String> },
    /// `["ERROR", message]`, server to client.
    Error { message: String },
}

impl Envelope {
    pub fn kind(&self) -> Kind {
        match self {
            Envelope::Start { .. } => Kind::Start,
            Envelope::Broadcast { .. } => Kind::Broadcast,
            Envelope::Private { .. } => Kind::Private,
            Envelope::Exit { .. } => Kind::Exit,
            Envelope::Join { .. } => Kind::Join,
            Envelope::Leave { .. } => Kind::Leave,
            Envelope::UserList { .. } => Kind::UserList,
            Envelope::Error { .. } => Kind::Error,
        }
    }

    /// Builds the server-to-client error envelope for a routing failure.
    pub fn error_from(err: &RelayError) -> Self {
        Envelope::Error {
            message: err.to_string(),
        }
    }

    /// Serializes the envelope into its JSON-array payload, without the length prefix.
    pub fn to_payload(&self) -> Result<Vec<u8>, RelayError> {
        let tag = Value::String(self.kind().to_string());
        let fields: Vec<Value> = match self {
            Envelope::Start { name }
            | Envelope::Exit { name }
            | Envelope::Join { name }
            | Envelope::Leave { name } => vec![tag, name.as_str().into()],
            Envelope::Broadcast { sender, text } => {
                vec![tag, sender.as_str().into(), text.as_str().into()]
            }
            Envelope::Private {
                sender,
                text,
                recipient,
            } => {
                let mut fields = vec![tag, sender.as_str().into(), text.as_str().into()];
                if let Some(recipient) = recipient {
                    fields.push(recipient.as_str().into());
                }
                fields
            }
            Envelope::UserList { names } => {
                let names = names.iter().map(|n| Value::String(n.clone())).collect();
                vec![tag, Value::Array(names)]
            }
            Envelope::Error { message } => vec![tag, message.as_str().into()],
        };
        Ok(serde_json::to_vec(&Value::Array(fields))?)
    }

    /// Validates a frame payload and turns it into an envelope.
    ///
    /// Malformed JSON, a missing or unknown tag, a field of the wrong type and
    /// a field count that does not fit the kind are all rejected.
    pub fn from_payload(payload: &[u8]) -> Result<Self, RelayError> {
        let text = std::str::from_utf8(payload)?;
        let value: Value = serde_json::from_str(text)?;
        let Value::Array(items) = value else {
            return Err(RelayError::Protocol(
                "payload is not a JSON array".to_string(),
            ));
        };

        let (tag, fields) = match items.split_first() {
            Some((Value::String(tag), rest)) => (tag.as_str(), rest),
            Some(_) => {
                return Err(RelayError::Protocol(
                    "message kind must be a string".to_string(),
                ));
            }
            None => return Err(RelayError::Protocol("empty payload array".to_string())),
        };
        let kind = Kind::from_str(tag).map_err(|_| RelayError::UnknownKind(tag.to_string()))?;

        let envelope = match (kind, fields) {
            (Kind::Start, [name]) => Envelope::Start {
                name: string_field(kind, name)?,
            },
            (Kind::Exit, [name]) => Envelope::Exit {
                name: string_field(kind, name)?,
            },
            (Kind::Join, [name]) => Envelope::Join {
                name: string_field(kind, name)?,
            },
            (Kind::Leave, [name]) => Envelope::Leave {
                name: string_field(kind, name)?,
            },
            (Kind::Error, [message]) => Envelope::Error {
                message: string_field(kind, message)?,
            },
            (Kind::Broadcast, [sender, text]) => Envelope::Broadcast {
                sender: string_field(kind, sender)?,
                text: string_field(kind, text)?,
            },
            (Kind::Private, [sender, text]) => Envelope::Private {
                sender: string_field(kind, sender)?,
                text: string_field(kind, text)?,
                recipient: None,
            },
            (Kind::Private, [sender, text, recipient]) => Envelope::Private {
                sender: string_field(kind, sender)?,
                text: string_field(kind, text)?,
                recipient: Some(string_field(kind, recipient)?),
            },
            (Kind::UserList, [Value::Array(names)]) => Envelope::UserList {
                names: names
                    .iter()
                    .map(|n| string_field(kind, n))
                    .collect::<Result<_, _>>()?,
            },
            (Kind::UserList, [_]) => {
                return Err(RelayError::Protocol(
                    "USER_LIST body must be an array of names".to_string(),
                ));
            }
            (kind, fields) => {
                return Err(RelayError::WrongArity {
                    kind: kind.to_string(),
                    expected: expected_arity(kind),
                    actual: fields.len(),
                });
            }
        };
        Ok(envelope)
    }

    /// Encodes the envelope into a complete frame: length prefix plus payload.
    pub fn encode_to_frame(&self) -> Result<Bytes, RelayError> {
        let mut buf = BytesMut::new();
        FrameCodec::default().encode(self.clone(), &mut buf)?;
        Ok(buf.freeze())
    }
}

fn string_field(kind: Kind, value: &Value) -> Result<String, RelayError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(RelayError::Protocol(format!(
            "{kind} fields must be strings, got {other}"
        ))),
    }
}

fn expected_arity(kind: Kind) -> &'static str {
    match kind {
        Kind::Start | Kind::Exit | Kind::Join | Kind::Leave | Kind::UserList | Kind::Error => "1",
        Kind::Broadcast => "2",
        Kind::Private => "2 or 3",
    }
}
