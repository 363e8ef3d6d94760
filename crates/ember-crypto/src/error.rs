//! Error types for sealing and key handling.

use thiserror::Error;

/// Errors from [`crate::unseal`].
///
/// Every failure mode of unsealing maps here; the function never panics.
/// Callers treat any variant as "no plaintext recovered" and must not
/// conflate it with an empty decrypted string, which is a success.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SealError {
    /// Blob is not valid base64 or is too short to contain a nonce and tag.
    #[error("malformed sealed blob")]
    Malformed,

    /// Blob was produced by an unknown format version.
    #[error("unsupported blob version: {version}")]
    UnsupportedVersion {
        /// Version byte found in the blob.
        version: u8,
    },

    /// Authentication tag check failed: wrong key or tampered ciphertext.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Decrypted bytes are not valid UTF-8.
    #[error("plaintext is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors from parsing externally supplied key material.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Key text is not valid hex.
    #[error("key is not valid hex")]
    InvalidHex,

    /// Key has the wrong length.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required length in bytes.
        expected: usize,
        /// Length that was supplied.
        actual: usize,
    },
}
