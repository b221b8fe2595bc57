use crate::error::CacheError;
use async_trait::async_trait;
use std::fmt::Display;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Reserved wire value meaning "confirmed absent".
///
/// It can never collide with a real value: normalized URLs percent-encode `!`
/// and `!` is outside the short code alphabet.
pub const NEGATIVE_SENTINEL: &str = "!NULL";

/// The two logical key spaces of the URL cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Short code → normalized long URL.
    ShortToLong,
    /// Normalized long URL → short code.
    LongToShort,
}

impl Namespace {
    /// Stable prefix used when a tier flattens namespaced keys.
    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::ShortToLong => "s2l",
            Namespace::LongToShort => "l2s",
        }
    }

    /// Builds the flattened key for `key` within this namespace.
    pub fn key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix(), key)
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A value written to a cache tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    Present(String),
    /// The store confirmed there is no mapping for the key.
    Absent,
}

impl CacheValue {
    /// Encodes the value for string-only backends.
    pub fn encode(&self) -> &str {
        match self {
            CacheValue::Present(value) => value,
            CacheValue::Absent => NEGATIVE_SENTINEL,
        }
    }

    /// Decodes a value read from a string-only backend.
    pub fn decode(raw: String) -> Self {
        if raw == NEGATIVE_SENTINEL {
            CacheValue::Absent
        } else {
            CacheValue::Present(raw)
        }
    }
}

impl From<CacheValue> for Lookup {
    fn from(value: CacheValue) -> Self {
        match value {
            CacheValue::Present(value) => Lookup::Hit(value),
            CacheValue::Absent => Lookup::NegativeHit,
        }
    }
}

/// Outcome of a cache read.
///
/// Keeps "no entry" ([`Lookup::Miss`]) apart from "confirmed absent"
/// ([`Lookup::NegativeHit`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Hit(String),
    Miss,
    NegativeHit,
}

impl Lookup {
    /// Converts a hit back into the value to store in another tier.
    pub fn to_cache_value(&self) -> Option<CacheValue> {
        match self {
            Lookup::Hit(value) => Some(CacheValue::Present(value.clone())),
            Lookup::NegativeHit => Some(CacheValue::Absent),
            Lookup::Miss => None,
        }
    }
}

/// A single cache tier.
///
/// Tiers are plain namespaced key/value stores with their own capacity and
/// TTL policy. Ordering, backfill and failure handling live in the tiered
/// cache that composes them.
#[async_trait]
pub trait CacheTier: Send + Sync + 'static {
    /// Short name used in logs (e.g. `"moka"`, `"redis"`).
    fn name(&self) -> &'static str;

    /// Reads `key` from `namespace`.
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Lookup>;

    /// Writes `value` under `key` in `namespace`, replacing any previous value.
    async fn put(&self, namespace: Namespace, key: &str, value: &CacheValue) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaced_keys_do_not_overlap() {
        assert_eq!(Namespace::ShortToLong.key("abc"), "s2l:abc");
        assert_eq!(Namespace::LongToShort.key("abc"), "l2s:abc");
    }

    #[test]
    fn sentinel_decodes_to_absent() {
        assert_eq!(
            CacheValue::decode(NEGATIVE_SENTINEL.to_string()),
            CacheValue::Absent
        );
        assert_eq!(CacheValue::Absent.encode(), NEGATIVE_SENTINEL);
    }

    #[test]
    fn literal_null_is_a_real_value() {
        assert_eq!(
            CacheValue::decode("NULL".to_string()),
            CacheValue::Present("NULL".to_string())
        );
    }

    #[test]
    fn lookup_from_value() {
        assert_eq!(
            Lookup::from(CacheValue::Present("x".into())),
            Lookup::Hit("x".into())
        );
        assert_eq!(Lookup::from(CacheValue::Absent), Lookup::NegativeHit);
        assert_eq!(Lookup::Miss.to_cache_value(), None);
    }
}
