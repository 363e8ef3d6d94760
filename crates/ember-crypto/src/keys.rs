//! Content key derivation for links and room codes.

use hkdf::Hkdf;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::KeyError;

/// Size of a content key in bytes (256-bit).
pub const CONTENT_KEY_SIZE: usize = 32;

/// Size of a one-shot link key in bytes (128-bit).
pub const LINK_KEY_SIZE: usize = 16;

/// PBKDF2 iteration count for room-code stretching.
pub const ROOM_KEY_ITERATIONS: u32 = 1000;

/// Application-wide PBKDF2 salt for room-code derivation.
///
/// Fixed on purpose: the room code must be the only input, so that every
/// client recomputes the identical key from the code alone. There is no
/// per-room salt storage anywhere.
const ROOM_KEY_SALT: [u8; 8] = [0x53, 0x6e, 0xc7, 0xe3, 0x49, 0x88, 0x77, 0xe8];

/// Label for link-key expansion (domain separation).
const LINK_KEY_LABEL: &[u8] = b"ember link key v1";

/// A 256-bit symmetric content key.
///
/// Used for exactly one purpose: sealing and unsealing blobs with
/// XChaCha20-Poly1305. Never serialized, never logged.
#[derive(Clone)]
pub struct ContentKey {
    /// The 32-byte symmetric key.
    key: [u8; CONTENT_KEY_SIZE],
}

impl ContentKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(key: [u8; CONTENT_KEY_SIZE]) -> Self {
        Self { key }
    }

    /// 32-byte symmetric key for the AEAD.
    pub fn as_bytes(&self) -> &[u8; CONTENT_KEY_SIZE] {
        &self.key
    }
}

impl Drop for ContentKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// A 128-bit one-shot link key.
///
/// Generated from caller-provided randomness at note creation and carried
/// only in the URL fragment of the locator. The hex form is what appears
/// after the `#`.
#[derive(Clone)]
pub struct LinkKey {
    /// The 16-byte raw key.
    key: [u8; LINK_KEY_SIZE],
}

impl LinkKey {
    /// Wrap raw key bytes (caller supplies cryptographically secure
    /// randomness in production).
    pub fn new(key: [u8; LINK_KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Parse the hex form found in a URL fragment.
    ///
    /// # Errors
    ///
    /// - [`KeyError::InvalidHex`]: not valid hex text
    /// - [`KeyError::InvalidLength`]: decodes to the wrong number of bytes
    pub fn from_hex(text: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(text).map_err(|_| KeyError::InvalidHex)?;
        let key: [u8; LINK_KEY_SIZE] = bytes
            .try_into()
            .map_err(|bytes: Vec<u8>| KeyError::InvalidLength {
                expected: LINK_KEY_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self { key })
    }

    /// Hex form for embedding in a locator fragment (32 lowercase chars).
    pub fn to_hex(&self) -> String {
        hex::encode(self.key)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; LINK_KEY_SIZE] {
        &self.key
    }
}

impl Drop for LinkKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Derive the content key for a room from its 6-character code.
///
/// PBKDF2-HMAC-SHA256 with the fixed application salt and iteration count.
/// Deterministic: the same code yields identical key bytes on every client
/// and process.
pub fn derive_room_key(code: &str) -> ContentKey {
    let mut key = [0u8; CONTENT_KEY_SIZE];
    pbkdf2_hmac::<Sha256>(code.as_bytes(), &ROOM_KEY_SALT, ROOM_KEY_ITERATIONS, &mut key);
    ContentKey::from_bytes(key)
}

/// Expand a 128-bit link key into the 256-bit content key.
///
/// HKDF-SHA256 with a fixed label. The link key is already uniformly
/// random, so no stretching is needed, only length expansion with domain
/// separation. Deterministic.
pub fn expand_link_key(link_key: &LinkKey) -> ContentKey {
    let hkdf = Hkdf::<Sha256>::new(None, link_key.as_bytes());

    let mut key = [0u8; CONTENT_KEY_SIZE];
    let Ok(()) = hkdf.expand(LINK_KEY_LABEL, &mut key) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    ContentKey::from_bytes(key)
}
