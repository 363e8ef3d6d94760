//! Ember test harness
//!
//! Deterministic stand-ins for everything outside the protocol core:
//!
//! - [`MemoryBackend`]: an in-process [`ember_core::SecretStore`] +
//!   [`ember_core::Realtime`] with per-room event fan-out, presence
//!   tracking, and fault injection (simulated uniqueness conflicts,
//!   outages)
//! - [`SimEnv`]: a seeded-RNG, manually-advanced-clock
//!   [`ember_core::env::Environment`]
//!
//! The same scenario run twice with the same seed produces the same
//! codes, keys, nonces, and record ids. Integration scenarios for the
//! whole protocol live in this crate's `tests/` directory.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod backend;
mod env;

pub use backend::MemoryBackend;
pub use env::SimEnv;
