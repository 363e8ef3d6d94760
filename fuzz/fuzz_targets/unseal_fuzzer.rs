//! Fuzz target for unseal
//!
//! Unsealing attacker-controlled blobs is the protocol's main hostile
//! surface: a viewer feeds whatever the backend returns straight into it.
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an
//! error value.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use ember_crypto::{ContentKey, derive_room_key, unseal};

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    key_bytes: [u8; 32],
    blob: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    // Arbitrary key, arbitrary blob: must return a value, never panic.
    let key = ContentKey::from_bytes(input.key_bytes);
    let _ = unseal(input.blob, &key);

    // Same blob against a code-derived key exercises the PBKDF2 path too.
    let derived = derive_room_key("QW34$%");
    let _ = unseal(input.blob, &derived);
});
