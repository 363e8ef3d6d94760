//! Room message envelope.
//!
//! Room plaintexts are a small JSON envelope so the sender's display name
//! travels inside the sealed blob: the backend never holds an alias
//! column, only ciphertext. The envelope also distinguishes the
//! room-opened marker (the initializer record that makes a room joinable)
//! from ordinary messages.

use serde::{Deserialize, Serialize};

/// What a room envelope carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnvelopeKind {
    /// Room initializer: makes the room joinable, carries no text.
    RoomOpened,

    /// An ordinary chat message.
    Text {
        /// Message body. May be empty; emptiness is not an error.
        body: String,
    },
}

/// The sealed plaintext of every room record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEnvelope {
    /// Sender's display name.
    pub alias: String,

    /// Payload.
    #[serde(flatten)]
    pub kind: EnvelopeKind,
}

impl ChatEnvelope {
    /// Envelope for an ordinary message.
    pub fn text(alias: impl Into<String>, body: impl Into<String>) -> Self {
        Self { alias: alias.into(), kind: EnvelopeKind::Text { body: body.into() } }
    }

    /// Envelope for the room initializer.
    pub fn room_opened(alias: impl Into<String>) -> Self {
        Self { alias: alias.into(), kind: EnvelopeKind::RoomOpened }
    }

    /// Serialize to the plaintext that gets sealed.
    pub fn encode(&self) -> String {
        let Ok(json) = serde_json::to_string(self) else {
            unreachable!("envelope of plain strings cannot fail to serialize");
        };
        json
    }

    /// Parse a decrypted plaintext back into an envelope.
    ///
    /// `None` means the plaintext was readable but not an envelope (e.g. a
    /// blob sealed by an incompatible client); callers show a placeholder.
    pub fn decode(plaintext: &str) -> Option<Self> {
        serde_json::from_str(plaintext).ok()
    }
}
