//! Ember Core
//!
//! Shared data model and collaborator boundary for the Ember protocol:
//! Secret Records, room codes, the [`SecretStore`]/[`Realtime`] traits that
//! describe the managed backend, and the [`env::Environment`] abstraction
//! that decouples protocol logic from time and randomness.
//!
//! The backend itself (persistence, realtime fan-out, row deletion) lives
//! outside this repository. Everything here is the contract the protocol
//! core holds it to:
//!
//! - rows are created, read, and deleted by opaque id or by room code
//! - `select_by_room` returns records in `created_at` ascending order
//! - deletes are idempotent
//! - a subscription is a cancellable stream of insert/delete/presence
//!   events filtered to one room code
//!
//! No plaintext and no key material ever crosses this boundary.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;

mod code;
mod error;
mod realtime;
mod record;
mod store;

pub use code::{CODE_ALPHABET, CODE_LENGTH, RoomCode};
pub use error::{CodeError, StoreError};
pub use realtime::{ChangeEvent, PresenceEvent, Realtime, RoomEvent, Subscription, SubscriptionGuard};
pub use record::{NewRecord, RecordId, SecretRecord, TimestampMs};
pub use store::SecretStore;
