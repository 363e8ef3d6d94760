//! Error taxonomy for the collaborator boundary.
//!
//! Strongly-typed errors instead of `std::io::Error`: the protocol layer
//! decides lifecycle transitions from these, so the variants mirror the
//! outcomes it must distinguish (absent row, uniqueness conflict,
//! infrastructure failure) and nothing else. Deliberately, "never
//! existed", "already burned", and "expired and purged" are all the same
//! `NotFound`.

use thiserror::Error;

/// Errors reported by a [`crate::SecretStore`] or [`crate::Realtime`]
/// implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record exists for the requested id.
    ///
    /// Identical whether the record never existed, was burned, or was
    /// purged after expiry; the distinction must not leak.
    #[error("record not found")]
    NotFound,

    /// Insert rejected by a uniqueness constraint.
    ///
    /// Room creation reacts by regenerating the code and retrying; no
    /// other operation retries on conflict.
    #[error("uniqueness conflict on insert")]
    Conflict,

    /// Network or infrastructure failure.
    #[error("backend unavailable: {reason}")]
    Unavailable {
        /// Human-readable cause for logs; not shown verbatim to users.
        reason: String,
    },
}

impl StoreError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Only infrastructure failures are transient. `NotFound` is a final
    /// answer, and `Conflict` is resolved by changing the input (a fresh
    /// code), not by repeating it.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Convenience constructor for infrastructure failures.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable { reason: reason.into() }
    }
}

/// Errors from validating room code text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    /// Code is not exactly 6 characters.
    #[error("room code must be exactly 6 characters, got {actual}")]
    WrongLength {
        /// Number of characters supplied.
        actual: usize,
    },

    /// Code contains whitespace or non-printable characters.
    #[error("room code contains invalid characters")]
    InvalidCharacter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailability_is_transient() {
        assert!(StoreError::unavailable("connection reset").is_transient());
        assert!(!StoreError::NotFound.is_transient());
        assert!(!StoreError::Conflict.is_transient());
    }

    #[test]
    fn not_found_reveals_nothing() {
        assert_eq!(StoreError::NotFound.to_string(), "record not found");
    }
}
