//! Sealing and unsealing of plaintext with XChaCha20-Poly1305.
//!
//! All functions are pure - random bytes must be provided by the caller.
//! This enables deterministic testing and keeps the crate sans-IO.
//!
//! A sealed blob is a self-contained base64 string:
//!
//! ```text
//! base64( version (1 byte) || nonce (24 bytes) || ciphertext + tag )
//! ```
//!
//! The caller never manages nonces or salts separately; everything needed
//! to unseal (besides the key) is embedded in the blob.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};

use crate::{error::SealError, keys::ContentKey};

/// Size of the XChaCha20 nonce embedded in each blob (24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Current blob format version.
const BLOB_VERSION: u8 = 1;

/// Poly1305 tag size (16 bytes).
const POLY1305_TAG_SIZE: usize = 16;

/// Smallest decoded blob: version byte, nonce, and the tag of an empty
/// plaintext.
const MIN_BLOB_SIZE: usize = 1 + NONCE_SIZE + POLY1305_TAG_SIZE;

/// Seal plaintext into a self-contained textual blob.
///
/// # Security
///
/// - Caller MUST provide cryptographically secure random bytes for the
///   nonce in production; a repeated (key, nonce) pair breaks
///   confidentiality.
/// - Authenticated encryption: any modification of the blob fails
///   [`unseal`].
pub fn seal(plaintext: &str, key: &ContentKey, nonce: [u8; NONCE_SIZE]) -> String {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let Ok(ciphertext) = cipher.encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes()) else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    let mut blob = Vec::with_capacity(1 + NONCE_SIZE + ciphertext.len());
    blob.push(BLOB_VERSION);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);

    BASE64.encode(blob)
}

/// Unseal a blob back into plaintext.
///
/// Never panics: any failure (wrong key, tampered or truncated blob,
/// unknown version, non-UTF-8 plaintext) is returned as a [`SealError`]
/// value. An empty plaintext is a valid success - callers distinguish
/// failure by the `Err` variant, not by emptiness.
///
/// # Errors
///
/// - [`SealError::Malformed`]: not base64, or shorter than a minimal blob
/// - [`SealError::UnsupportedVersion`]: unknown format version byte
/// - [`SealError::AuthenticationFailed`]: wrong key or tampered data
/// - [`SealError::InvalidUtf8`]: decrypted bytes are not UTF-8 text
pub fn unseal(blob: &str, key: &ContentKey) -> Result<String, SealError> {
    let bytes = BASE64.decode(blob).map_err(|_| SealError::Malformed)?;

    if bytes.len() < MIN_BLOB_SIZE {
        return Err(SealError::Malformed);
    }

    let version = bytes[0];
    if version != BLOB_VERSION {
        return Err(SealError::UnsupportedVersion { version });
    }

    let nonce = XNonce::from_slice(&bytes[1..=NONCE_SIZE]);
    let ciphertext = &bytes[1 + NONCE_SIZE..];

    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let plaintext =
        cipher.decrypt(nonce, ciphertext).map_err(|_| SealError::AuthenticationFailed)?;

    String::from_utf8(plaintext).map_err(|_| SealError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::keys::{CONTENT_KEY_SIZE, derive_room_key};

    fn test_key(fill: u8) -> ContentKey {
        ContentKey::from_bytes([fill; CONTENT_KEY_SIZE])
    }

    #[test]
    fn seal_unseal_roundtrip() {
        let key = test_key(0x42);
        let blob = seal("hello world", &key, [0xAB; NONCE_SIZE]);
        assert_eq!(unseal(&blob, &key).unwrap(), "hello world");
    }

    #[test]
    fn empty_plaintext_is_success_not_failure() {
        let key = test_key(0x01);
        let blob = seal("", &key, [0x00; NONCE_SIZE]);
        assert_eq!(unseal(&blob, &key).unwrap(), "");
    }

    #[test]
    fn unicode_plaintext_roundtrip() {
        let key = test_key(0x07);
        let text = "špion → 🔥 burn after reading";
        let blob = seal(text, &key, [0x11; NONCE_SIZE]);
        assert_eq!(unseal(&blob, &key).unwrap(), text);
    }

    #[test]
    fn wrong_key_fails() {
        let blob = seal("secret", &test_key(0x01), [0x00; NONCE_SIZE]);
        assert_eq!(unseal(&blob, &test_key(0x02)), Err(SealError::AuthenticationFailed));
    }

    #[test]
    fn wrong_room_code_fails() {
        let blob = seal("secret", &derive_room_key("AB12!@"), [0x05; NONCE_SIZE]);
        assert_eq!(unseal(&blob, &derive_room_key("ZZ99#$")), Err(SealError::AuthenticationFailed));
    }

    #[test]
    fn tampered_blob_fails() {
        let key = test_key(0x42);
        let blob = seal("original", &key, [0x00; NONCE_SIZE]);

        let mut bytes = BASE64.decode(&blob).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let tampered = BASE64.encode(bytes);

        assert_eq!(unseal(&tampered, &key), Err(SealError::AuthenticationFailed));
    }

    #[test]
    fn non_base64_is_malformed() {
        assert_eq!(unseal("!!! not base64 !!!", &test_key(0)), Err(SealError::Malformed));
    }

    #[test]
    fn truncated_blob_is_malformed() {
        let key = test_key(0x42);
        let blob = seal("hello", &key, [0x00; NONCE_SIZE]);

        let bytes = BASE64.decode(&blob).unwrap();
        let truncated = BASE64.encode(&bytes[..MIN_BLOB_SIZE - 1]);

        assert_eq!(unseal(&truncated, &key), Err(SealError::Malformed));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let key = test_key(0x42);
        let blob = seal("hello", &key, [0x00; NONCE_SIZE]);

        let mut bytes = BASE64.decode(&blob).unwrap();
        bytes[0] = 9;
        let versioned = BASE64.encode(bytes);

        assert_eq!(unseal(&versioned, &key), Err(SealError::UnsupportedVersion { version: 9 }));
    }

    #[test]
    fn different_nonces_produce_different_blobs() {
        let key = test_key(0x42);
        let a = seal("same text", &key, [0x00; NONCE_SIZE]);
        let b = seal("same text", &key, [0x01; NONCE_SIZE]);
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn roundtrip_recovers_any_plaintext(
            text in ".*",
            nonce in prop::array::uniform24(any::<u8>()),
        ) {
            let key = test_key(0x5A);
            let blob = seal(&text, &key, nonce);
            prop_assert_eq!(unseal(&blob, &key).unwrap(), text);
        }

        #[test]
        fn distinct_keys_never_unseal(text in ".+", a in 0u8..128u8, b in 128u8..=255u8) {
            let blob = seal(&text, &test_key(a), [0x33; NONCE_SIZE]);
            prop_assert_eq!(unseal(&blob, &test_key(b)), Err(SealError::AuthenticationFailed));
        }

        #[test]
        fn arbitrary_input_never_panics(blob in ".*") {
            // Whatever comes in, unseal returns a value.
            let _ = unseal(&blob, &test_key(0x01));
        }
    }
}
