//! Driver-level error types.
//!
//! These wrap the core taxonomy into the outcomes each flow can actually
//! end in, so callers match on what happened rather than on transport
//! details.

use thiserror::Error;

use ember_core::{CodeError, StoreError};

/// Errors from publishing a one-shot note.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Nothing to store: blank submission.
    #[error("note text is empty")]
    EmptyNote,

    /// The insert failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from creating a room.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CreateError {
    /// Every generated code collided within the configured bound.
    #[error("no unique room code after {attempts} attempts")]
    CodesExhausted {
        /// Attempts that were made.
        attempts: u32,
    },

    /// A non-conflict backend failure ended the sequence.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from joining a room.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JoinError {
    /// Code text is malformed; rejected before any backend call.
    #[error("invalid room code: {0}")]
    InvalidCode(#[from] CodeError),

    /// No surviving records for the code. Indistinguishable from a room
    /// that never existed, was nuked, or expired.
    #[error("access denied")]
    AccessDenied,

    /// The backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(StoreError),
}
