//! Secret Record data model.
//!
//! A Secret Record is the only thing the backend ever stores: an opaque
//! sealed blob plus routing metadata. The backend assigns `id` and
//! `created_at` on insert; everything else comes from the client.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::code::RoomCode;

/// Milliseconds since the Unix epoch.
///
/// The unit of the backend's `created_at` and `expires_at` columns.
pub type TimestampMs = u64;

/// Opaque backend-assigned record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap an identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as text, e.g. for building a locator path.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored row: sealed ciphertext plus routing metadata.
///
/// The `content` blob is opaque to the backend; decryption capability
/// never leaves the clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    /// Backend-assigned identifier.
    pub id: RecordId,
    /// Sealed blob (self-contained base64 text).
    pub content: String,
    /// Room this record belongs to. `None` for one-shot notes.
    pub room_code: Option<RoomCode>,
    /// Backend-assigned creation time.
    pub created_at: TimestampMs,
    /// Absolute expiry. Set for room records, `None` for one-shot notes.
    pub expires_at: Option<TimestampMs>,
}

impl SecretRecord {
    /// Whether this record's window has lapsed.
    ///
    /// Actual deletion at expiry is an external purge's job; readers treat
    /// lapsed records as invalid whether or not the purge has run yet.
    pub fn is_expired(&self, now: TimestampMs) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Insert payload: a [`SecretRecord`] minus the backend-assigned fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    /// Sealed blob to store.
    pub content: String,
    /// Room this record belongs to. `None` for one-shot notes.
    pub room_code: Option<RoomCode>,
    /// Absolute expiry, if any.
    pub expires_at: Option<TimestampMs>,
}

impl NewRecord {
    /// Payload for a one-shot note: no room, no expiry.
    pub fn one_shot(content: impl Into<String>) -> Self {
        Self { content: content.into(), room_code: None, expires_at: None }
    }

    /// Payload for a room message.
    pub fn room_message(
        content: impl Into<String>,
        room_code: RoomCode,
        expires_at: Option<TimestampMs>,
    ) -> Self {
        Self { content: content.into(), room_code: Some(room_code), expires_at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(expires_at: Option<TimestampMs>) -> SecretRecord {
        SecretRecord {
            id: RecordId::new("rec-1"),
            content: "blob".to_owned(),
            room_code: None,
            created_at: 1_000,
            expires_at,
        }
    }

    #[test]
    fn no_expiry_never_lapses() {
        assert!(!record(None).is_expired(u64::MAX));
    }

    #[test]
    fn expiry_is_inclusive() {
        let rec = record(Some(5_000));
        assert!(!rec.is_expired(4_999));
        assert!(rec.is_expired(5_000));
        assert!(rec.is_expired(5_001));
    }

    #[test]
    fn record_id_serializes_transparently() {
        let id = RecordId::new("abc123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");
    }

    #[test]
    fn one_shot_payload_has_no_room_metadata() {
        let rec = NewRecord::one_shot("blob");
        assert_eq!(rec.room_code, None);
        assert_eq!(rec.expires_at, None);
    }
}
