//! Application layer for Ember
//!
//! Async drivers that connect the pure state machines in [`ember_client`]
//! to a concrete backend collaborator, mirroring the split the rest of the
//! workspace keeps: machines decide, drivers execute.
//!
//! # Components
//!
//! - [`NoteService`]: one-shot flows - publish a note and get a locator,
//!   open a locator and (at most once) reveal and burn the note
//! - [`RoomRuntime`]: creates rooms with bounded collision retry and joins
//!   them, yielding a [`JoinedRoom`]
//! - [`JoinedRoom`]: a live session - send, nuke, leave, and pump
//!   subscription events into the session machine
//!
//! Every suspension point is a backend call or a subscription await; no
//! lock is ever held across one.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod notes;
mod rooms;

pub use error::{CreateError, JoinError, PublishError};
pub use notes::{NoteOutcome, NoteService};
pub use rooms::{JoinedRoom, RoomRuntime};
