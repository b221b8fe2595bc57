use crate::error::CoreError;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use url::form_urlencoded;

/// Maximum length of a normalized long URL, matching the store's column width.
pub const MAX_LONG_URL_LENGTH: usize = 2048;

const STRIPPED_SCHEME: &str = "https://";

/// A long URL in the canonical form used for hashing, cache keys and storage.
///
/// Normalization strips a single leading `https://` and then form-encodes the
/// remainder: alphanumerics and `*-._` are kept, a space becomes `+`, and every
/// other byte becomes `%XX`. The same value is used on every path, so a given
/// input always maps to the same cache key and the same row.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedUrl(String);

impl NormalizedUrl {
    /// Normalizes a raw long URL as submitted by a client.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        let without_scheme = trimmed.strip_prefix(STRIPPED_SCHEME).unwrap_or(trimmed);
        if without_scheme.is_empty() {
            return Err(CoreError::InvalidUrl("URL cannot be empty".to_string()));
        }

        let encoded: String = form_urlencoded::byte_serialize(without_scheme.as_bytes()).collect();
        if encoded.len() > MAX_LONG_URL_LENGTH {
            return Err(CoreError::InvalidUrl(format!(
                "encoded URL must be at most {} characters, got {}",
                MAX_LONG_URL_LENGTH,
                encoded.len()
            )));
        }

        Ok(Self(encoded))
    }

    /// Wraps a value that is already normalized, such as a row read from the store.
    pub fn from_normalized(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the normalized form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reverses the form encoding, yielding the URL as the client submitted it
    /// (minus a stripped `https://` prefix).
    pub fn decode(&self) -> String {
        let spaced = self.0.replace('+', " ");
        percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for NormalizedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_https_scheme_and_encodes() {
        let url = NormalizedUrl::parse("https://example.com/a?b=c d").unwrap();
        assert_eq!(url.as_str(), "example.com%2Fa%3Fb%3Dc+d");
    }

    #[test]
    fn keeps_other_schemes_encoded() {
        let url = NormalizedUrl::parse("http://example.com").unwrap();
        assert_eq!(url.as_str(), "http%3A%2F%2Fexample.com");
    }

    #[test]
    fn without_scheme_and_with_https_normalize_identically() {
        let a = NormalizedUrl::parse("example.com/a").unwrap();
        let b = NormalizedUrl::parse("https://example.com/a").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn only_the_first_scheme_is_stripped() {
        let url = NormalizedUrl::parse("https://https://x.io").unwrap();
        assert_eq!(url.as_str(), "https%3A%2F%2Fx.io");
    }

    #[test]
    fn rejects_empty() {
        assert!(NormalizedUrl::parse("").is_err());
        assert!(NormalizedUrl::parse("   ").is_err());
        assert!(NormalizedUrl::parse("https://").is_err());
    }

    #[test]
    fn rejects_overlong_encoded_form() {
        // Each '/' expands to three characters once encoded.
        let raw = format!("example.com{}", "/".repeat(700));
        assert!(NormalizedUrl::parse(&raw).is_err());

        let fits = "a".repeat(MAX_LONG_URL_LENGTH);
        assert!(NormalizedUrl::parse(&fits).is_ok());
    }

    #[test]
    fn decode_reverses_encoding() {
        let raw = "example.com/päth?q=a b&x=%41";
        let url = NormalizedUrl::parse(raw).unwrap();
        assert_eq!(url.decode(), raw);
    }

    #[test]
    fn never_contains_reserved_marker() {
        let url = NormalizedUrl::parse("!NULL").unwrap();
        assert!(!url.as_str().contains('!'));
    }
}
