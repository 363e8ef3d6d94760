//! One-shot note locators.
//!
//! A locator is everything a recipient needs: `<origin>/view/<id>#<key>`.
//! The id addresses the stored row; the key after `#` is a URL fragment,
//! which transport semantics guarantee is never sent to any server. The
//! two halves only ever meet in the recipient's client.

use thiserror::Error;

use ember_core::RecordId;
use ember_crypto::{KeyError, LinkKey};

/// Path segment between origin and record id.
const VIEW_SEGMENT: &str = "/view/";

/// Parse or build errors for locator URLs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocatorError {
    /// No `#` fragment: the decryption key is missing.
    #[error("locator has no key fragment")]
    MissingFragment,

    /// URL path does not contain a record id under `/view/`.
    #[error("locator has no record id")]
    MissingId,

    /// Fragment is not a valid link key.
    #[error("locator key is invalid: {0}")]
    InvalidKey(#[from] KeyError),
}

/// A complete one-shot note locator.
///
/// No `Display` implementation on purpose: the URL embeds the key, so
/// rendering it must be an explicit [`to_url`](Self::to_url) call, never
/// an accidental log line.
#[derive(Clone)]
pub struct Locator {
    /// Site origin, e.g. `https://ember.example`.
    origin: String,
    /// Stored record id.
    id: RecordId,
    /// Decryption key carried in the fragment.
    key: LinkKey,
}

impl Locator {
    /// Assemble a locator from its parts.
    pub fn new(origin: impl Into<String>, id: RecordId, key: LinkKey) -> Self {
        Self { origin: origin.into(), id, key }
    }

    /// Parse a shared link.
    ///
    /// # Errors
    ///
    /// - [`LocatorError::MissingFragment`]: no `#` or empty fragment
    /// - [`LocatorError::MissingId`]: no `/view/<id>` path
    /// - [`LocatorError::InvalidKey`]: fragment is not a 128-bit hex key
    pub fn parse(url: &str) -> Result<Self, LocatorError> {
        let (base, fragment) = url.split_once('#').ok_or(LocatorError::MissingFragment)?;
        if fragment.is_empty() {
            return Err(LocatorError::MissingFragment);
        }

        let key = LinkKey::from_hex(fragment)?;

        let at = base.rfind(VIEW_SEGMENT).ok_or(LocatorError::MissingId)?;
        let (origin, id_part) = (&base[..at], &base[at + VIEW_SEGMENT.len()..]);
        let id = id_part.trim_end_matches('/');
        if id.is_empty() {
            return Err(LocatorError::MissingId);
        }

        Ok(Self { origin: origin.to_owned(), id: RecordId::new(id), key })
    }

    /// Render the shareable URL.
    pub fn to_url(&self) -> String {
        format!("{}{}{}#{}", self.origin, VIEW_SEGMENT, self.id, self.key.to_hex())
    }

    /// Record id half of the capability.
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Key half of the capability.
    pub fn key(&self) -> &LinkKey {
        &self.key
    }

    /// Site origin.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use ember_crypto::LINK_KEY_SIZE;

    fn test_key() -> LinkKey {
        LinkKey::new([0xA7; LINK_KEY_SIZE])
    }

    #[test]
    fn url_roundtrip() {
        let locator = Locator::new("https://ember.example", RecordId::new("abc123"), test_key());
        let url = locator.to_url();
        assert_eq!(
            url,
            format!("https://ember.example/view/abc123#{}", test_key().to_hex())
        );

        let parsed = Locator::parse(&url).unwrap();
        assert_eq!(parsed.origin(), "https://ember.example");
        assert_eq!(parsed.id(), &RecordId::new("abc123"));
        assert_eq!(parsed.key().as_bytes(), test_key().as_bytes());
    }

    #[test]
    fn missing_fragment_is_rejected_without_parsing_path() {
        assert_eq!(
            Locator::parse("https://ember.example/view/abc123").err(),
            Some(LocatorError::MissingFragment)
        );
        assert_eq!(
            Locator::parse("https://ember.example/view/abc123#").err(),
            Some(LocatorError::MissingFragment)
        );
    }

    #[test]
    fn missing_view_path_is_rejected() {
        let hex = test_key().to_hex();
        assert_eq!(
            Locator::parse(&format!("https://ember.example/abc123#{hex}")).err(),
            Some(LocatorError::MissingId)
        );
        assert_eq!(
            Locator::parse(&format!("https://ember.example/view/#{hex}")).err(),
            Some(LocatorError::MissingId)
        );
    }

    #[test]
    fn bad_key_is_rejected() {
        let err = Locator::parse("https://ember.example/view/abc123#nothex").err();
        assert!(matches!(err, Some(LocatorError::InvalidKey(_))));
    }

    #[test]
    fn trailing_slash_after_id_is_tolerated() {
        let url = format!("https://ember.example/view/abc123/#{}", test_key().to_hex());
        assert_eq!(Locator::parse(&url).unwrap().id(), &RecordId::new("abc123"));
    }

    proptest! {
        #[test]
        fn parse_never_panics(url in ".*") {
            let _ = Locator::parse(&url);
        }
    }
}
