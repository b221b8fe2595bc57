use async_trait::async_trait;
use moka::future::Cache;
use std::time::Duration;
use tinyurl_core::cache::Result;
use tinyurl_core::{CacheTier, CacheValue, Lookup, Namespace};
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

/// Default maximum number of entries held by the local tier.
pub const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Default time-to-live of local entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// An in-process cache tier using Moka.
///
/// Bounded and short-lived; meant as the L1 tier in front of Redis. Negative
/// entries are stored as [`CacheValue::Absent`] directly, so no sentinel
/// string is involved.
#[derive(Debug, Clone)]
pub struct MokaTier {
    cache: Cache<String, CacheValue>,
}

impl MokaTier {
    /// Creates a Moka tier with the default capacity and TTL.
    pub fn new() -> Self {
        MokaTierConfig::builder().build().into()
    }

    /// Creates a Moka tier with a custom maximum capacity and no TTL.
    pub fn with_capacity(max_capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(max_capacity).build();
        Self { cache }
    }

    /// Creates a Moka tier whose entries expire `ttl` after insertion.
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        MokaTierConfig::builder()
            .max_capacity(max_capacity)
            .ttl(ttl)
            .build()
            .into()
    }

    /// Returns a builder for creating a custom tier configuration.
    pub fn builder() -> MokaTierConfigBuilder {
        MokaTierConfig::builder()
    }
}

impl Default for MokaTier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheTier for MokaTier {
    fn name(&self) -> &'static str {
        "moka"
    }

    async fn get(&self, namespace: Namespace, key: &str) -> Result<Lookup> {
        let cache_key = namespace.key(key);
        match self.cache.get(&cache_key).await {
            Some(value) => {
                debug!(namespace = %namespace, key, "Cache hit in Moka");
                Ok(value.into())
            }
            None => {
                trace!(namespace = %namespace, key, "Cache miss in Moka");
                Ok(Lookup::Miss)
            }
        }
    }

    async fn put(&self, namespace: Namespace, key: &str, value: &CacheValue) -> Result<()> {
        self.cache.insert(namespace.key(key), value.clone()).await;
        trace!(namespace = %namespace, key, "Cached value in Moka");
        Ok(())
    }
}

/// Configuration for creating a [`MokaTier`].
#[derive(Debug, TypedBuilder)]
pub struct MokaTierConfig {
    /// Maximum number of entries the tier can hold.
    #[builder(default = DEFAULT_MAX_CAPACITY)]
    max_capacity: u64,
    /// Time-to-live for entries.
    #[builder(default = DEFAULT_TTL)]
    ttl: Duration,
}

impl From<MokaTierConfig> for MokaTier {
    fn from(config: MokaTierConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.ttl)
            .build();
        MokaTier { cache }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_and_put() {
        let tier = MokaTier::new();

        assert_eq!(
            tier.get(Namespace::ShortToLong, "abc").await.unwrap(),
            Lookup::Miss
        );

        tier.put(
            Namespace::ShortToLong,
            "abc",
            &CacheValue::Present("example.com".into()),
        )
        .await
        .unwrap();

        assert_eq!(
            tier.get(Namespace::ShortToLong, "abc").await.unwrap(),
            Lookup::Hit("example.com".into())
        );
    }

    #[tokio::test]
    async fn namespaces_are_independent() {
        let tier = MokaTier::new();
        tier.put(
            Namespace::ShortToLong,
            "same",
            &CacheValue::Present("long".into()),
        )
        .await
        .unwrap();

        assert_eq!(
            tier.get(Namespace::LongToShort, "same").await.unwrap(),
            Lookup::Miss
        );
    }

    #[tokio::test]
    async fn absent_round_trips_as_negative_hit() {
        let tier = MokaTier::new();
        tier.put(Namespace::ShortToLong, "gone", &CacheValue::Absent)
            .await
            .unwrap();

        assert_eq!(
            tier.get(Namespace::ShortToLong, "gone").await.unwrap(),
            Lookup::NegativeHit
        );
    }

    #[tokio::test]
    async fn put_overwrites_negative_entry() {
        let tier = MokaTier::new();
        tier.put(Namespace::ShortToLong, "abc", &CacheValue::Absent)
            .await
            .unwrap();
        tier.put(
            Namespace::ShortToLong,
            "abc",
            &CacheValue::Present("example.com".into()),
        )
        .await
        .unwrap();

        assert_eq!(
            tier.get(Namespace::ShortToLong, "abc").await.unwrap(),
            Lookup::Hit("example.com".into())
        );
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let tier = MokaTier::with_ttl(100, Duration::from_millis(50));
        tier.put(
            Namespace::ShortToLong,
            "abc",
            &CacheValue::Present("example.com".into()),
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(
            tier.get(Namespace::ShortToLong, "abc").await.unwrap(),
            Lookup::Miss
        );
    }
}
