//! Fuzz target for Locator::parse
//!
//! Locator URLs arrive from pasted links; parsing must reject anything
//! malformed without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;

use ember_client::Locator;

fuzz_target!(|url: &str| {
    if let Ok(locator) = Locator::parse(url) {
        // Anything that parses must re-render to something that parses
        // back to the same capability.
        let reparsed = Locator::parse(&locator.to_url()).expect("rendered locator must parse");
        assert_eq!(reparsed.id(), locator.id());
        assert_eq!(reparsed.key().as_bytes(), locator.key().as_bytes());
    }
});
