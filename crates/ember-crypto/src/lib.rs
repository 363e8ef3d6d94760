//! Ember Cryptographic Primitives
//!
//! Cryptographic building blocks for Ember. Pure functions with
//! deterministic outputs. Callers provide random bytes for deterministic
//! testing.
//!
//! # Key Lifecycle
//!
//! Two kinds of secret turn into the same 256-bit content key:
//!
//! ```text
//! One-shot link                    Room chat
//! =============                    =========
//! 128-bit random LinkKey           6-character room code
//!        │                                │
//!        ▼                                ▼
//! HKDF-SHA256 (fixed label)        PBKDF2-HMAC-SHA256 (fixed salt)
//!        │                                │
//!        └────────────┬───────────────────┘
//!                     ▼
//!               ContentKey (256-bit)
//!                     │
//!                     ▼
//!        XChaCha20-Poly1305 AEAD → sealed blob (base64 text)
//! ```
//!
//! The link key travels only in a URL fragment; the room code travels only
//! out-of-band. Neither is ever part of a backend request body, so the
//! stored blob is opaque to the storage collaborator.
//!
//! # Security
//!
//! - Sealing is authenticated: a wrong key or a tampered blob fails the
//!   Poly1305 tag check and yields an error value, never plaintext.
//! - Room-code derivation uses a fixed application-wide salt so that the
//!   code alone reproduces the key on every client. This is an intentional
//!   weakening: precomputation resistance is traded for code-only
//!   portability, acceptable for short-lived low-value rooms.
//! - Key material is zeroized on drop.
//! - `unseal` never panics; malformed input of any shape maps to
//!   [`SealError`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod keys;
mod sealed;

pub use error::{KeyError, SealError};
pub use keys::{
    CONTENT_KEY_SIZE, ContentKey, LINK_KEY_SIZE, LinkKey, ROOM_KEY_ITERATIONS, derive_room_key,
    expand_link_key,
};
pub use sealed::{NONCE_SIZE, seal, unseal};
