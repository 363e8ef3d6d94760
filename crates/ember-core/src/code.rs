//! Room codes: generation and validation.
//!
//! A room code is both the room identifier and, through key derivation,
//! the decryption capability. Codes are 6 characters drawn from a fixed
//! 40-symbol alphabet chosen to survive being read aloud or retyped:
//! no `I`/`O`/`0`/`1` lookalikes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{env::Environment, error::CodeError};

/// Length of a room code in characters.
pub const CODE_LENGTH: usize = 6;

/// Alphabet codes are generated from: 24 unambiguous uppercase letters,
/// 8 unambiguous digits, 8 symbols.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789!@#$%&*+";

/// Largest byte value accepted by rejection sampling.
///
/// 240 is the largest multiple of the alphabet size below 256, so
/// `byte % 40` is exactly uniform over accepted bytes.
const REJECTION_BOUND: u8 = (CODE_ALPHABET.len() * (256 / CODE_ALPHABET.len())) as u8;

/// A validated 6-character room code.
///
/// Parsing only checks shape (length, printable ASCII): a code is an
/// opaque capability at join time, and codes minted by older or foreign
/// clients must not be rejected by the current generator's alphabet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Validate user-supplied code text.
    ///
    /// # Errors
    ///
    /// - [`CodeError::WrongLength`]: not exactly 6 characters
    /// - [`CodeError::InvalidCharacter`]: contains whitespace or
    ///   non-printable characters
    pub fn parse(text: &str) -> Result<Self, CodeError> {
        let length = text.chars().count();
        if length != CODE_LENGTH {
            return Err(CodeError::WrongLength { actual: length });
        }
        if !text.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(CodeError::InvalidCharacter);
        }
        Ok(Self(text.to_owned()))
    }

    /// Draw a fresh code uniformly from [`CODE_ALPHABET`].
    ///
    /// Uses rejection sampling over environment randomness so no alphabet
    /// position is favored by modulo bias.
    pub fn generate<E: Environment>(env: &E) -> Self {
        let mut code = String::with_capacity(CODE_LENGTH);
        let mut buffer = [0u8; 16];

        while code.len() < CODE_LENGTH {
            env.random_bytes(&mut buffer);
            for byte in buffer {
                if byte < REJECTION_BOUND {
                    let index = byte as usize % CODE_ALPHABET.len();
                    code.push(CODE_ALPHABET[index] as char);
                    if code.len() == CODE_LENGTH {
                        break;
                    }
                }
            }
        }

        Self(code)
    }

    /// Code as text (exactly 6 ASCII characters).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = CodeError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(&text)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}
