//! Client
//!
//! Action-based state machines for the Ember protocol: one-shot note
//! publishing and viewing, room creation, and room sessions.
//!
//! # Architecture
//!
//! Every machine here is Sans-IO: it receives events, transitions an
//! explicit finite-state value through pure logic, and returns actions
//! for the caller to execute against the backend collaborator. No machine
//! performs I/O, holds global state, or registers callbacks; the caller
//! owns the value and drives it.
//!
//! # Components
//!
//! - [`NotePublisher`] / [`NoteViewer`]: one-shot secret link lifecycle,
//!   including the at-most-once burn latch on the viewer
//! - [`RoomCreation`]: code generation with bounded collision retry
//! - [`RoomSession`]: join validation, history reconstruction, live
//!   updates, presence, and nuke-driven termination
//! - [`Locator`]: the `<origin>/view/<id>#<key>` link format; the key
//!   lives in the fragment and is never part of any backend request

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod create;
mod envelope;
mod locator;
mod note;
mod room;

pub use create::{CreateConfig, CreateFailure, CreationAction, CreationEvent, CreationState, RoomCreation};
pub use envelope::{ChatEnvelope, EnvelopeKind};
pub use locator::{Locator, LocatorError};
pub use note::{
    Denial, NotePublisher, NoteViewer, PublisherAction, PublisherEvent, PublisherState,
    ViewerAction, ViewerEvent, ViewerState,
};
pub use room::{
    ChatMessage, MessageBody, RoomSession, SessionAction, SessionEvent, SessionPhase, Termination,
};
