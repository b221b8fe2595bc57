use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tinyurl_core::{CacheTier, CacheValue, Lookup, Namespace, NormalizedUrl, ShortCode};
use tracing::{debug, trace, warn};

/// Default bound on a single tier call.
pub const DEFAULT_TIER_TIMEOUT: Duration = Duration::from_millis(250);

/// A cache made of an ordered list of tiers, fastest first.
///
/// # Operation Strategy
///
/// - **Get**: Try each tier in order. The first hit (real value or negative
///   entry) wins and is backfilled into every faster tier that missed.
/// - **Put**: Write to every tier, slowest (most durable) first.
///
/// The cache is advisory. Every tier call is bounded by a timeout, and a tier
/// that errors or times out is logged and treated as a miss on reads and
/// skipped on writes, so callers always fall through to the store instead of
/// failing.
#[derive(Clone)]
pub struct TieredCache {
    tiers: Vec<Arc<dyn CacheTier>>,
    timeout: Duration,
}

impl TieredCache {
    /// Creates a tiered cache from tiers ordered fastest first.
    pub fn new(tiers: Vec<Arc<dyn CacheTier>>) -> Self {
        Self::with_timeout(tiers, DEFAULT_TIER_TIMEOUT)
    }

    /// Creates a tiered cache with a custom per-call timeout.
    pub fn with_timeout(tiers: Vec<Arc<dyn CacheTier>>, timeout: Duration) -> Self {
        Self { tiers, timeout }
    }

    /// A cache with no tiers; every read misses.
    pub fn disabled() -> Self {
        Self::new(Vec::new())
    }

    /// Returns the tiers in lookup order.
    pub fn tiers(&self) -> &[Arc<dyn CacheTier>] {
        &self.tiers
    }

    /// Reads `key` from `namespace`, backfilling faster tiers on a hit.
    pub async fn get(&self, namespace: Namespace, key: &str) -> Lookup {
        for (index, tier) in self.tiers.iter().enumerate() {
            let read = tokio::time::timeout(self.timeout, tier.get(namespace, key)).await;
            let lookup = match read {
                Ok(Ok(lookup)) => lookup,
                Ok(Err(e)) => {
                    warn!(
                        tier = tier.name(),
                        namespace = %namespace,
                        key,
                        error = %e,
                        "Cache tier read failed, treating as miss"
                    );
                    continue;
                }
                Err(_) => {
                    warn!(
                        tier = tier.name(),
                        namespace = %namespace,
                        key,
                        "Cache tier read timed out, treating as miss"
                    );
                    continue;
                }
            };

            let Some(value) = lookup.to_cache_value() else {
                trace!(tier = tier.name(), namespace = %namespace, key, "Tier miss");
                continue;
            };

            debug!(tier = tier.name(), namespace = %namespace, key, "Tier hit");
            for faster in &self.tiers[..index] {
                self.put_tier(faster.as_ref(), namespace, key, &value).await;
            }
            return lookup;
        }

        Lookup::Miss
    }

    /// Writes `value` to every tier. Failures are logged and swallowed.
    pub async fn put(&self, namespace: Namespace, key: &str, value: CacheValue) {
        for tier in self.tiers.iter().rev() {
            self.put_tier(tier.as_ref(), namespace, key, &value).await;
        }
    }

    /// Caches both directions of a mapping.
    ///
    /// The two writes are independent; a partial failure only leaves the cache
    /// less warm.
    pub async fn dual_put(&self, code: &ShortCode, url: &NormalizedUrl) {
        self.put(
            Namespace::ShortToLong,
            code.as_str(),
            CacheValue::Present(url.as_str().to_owned()),
        )
        .await;
        self.put(
            Namespace::LongToShort,
            url.as_str(),
            CacheValue::Present(code.as_str().to_owned()),
        )
        .await;
    }

    /// Records that the store has no mapping for `code`.
    pub async fn put_absent(&self, code: &ShortCode) {
        self.put(Namespace::ShortToLong, code.as_str(), CacheValue::Absent)
            .await;
    }

    async fn put_tier(
        &self,
        tier: &dyn CacheTier,
        namespace: Namespace,
        key: &str,
        value: &CacheValue,
    ) {
        match tokio::time::timeout(self.timeout, tier.put(namespace, key, value)).await {
            Ok(Ok(())) => {
                trace!(tier = tier.name(), namespace = %namespace, key, "Stored in tier");
            }
            Ok(Err(e)) => {
                warn!(
                    tier = tier.name(),
                    namespace = %namespace,
                    key,
                    error = %e,
                    "Cache tier write failed"
                );
            }
            Err(_) => {
                warn!(
                    tier = tier.name(),
                    namespace = %namespace,
                    key,
                    "Cache tier write timed out"
                );
            }
        }
    }
}

impl fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.tiers.iter().map(|tier| tier.name()).collect();
        f.debug_struct("TieredCache")
            .field("tiers", &names)
            .field("timeout", &self.timeout)
            .finish()
    }
}
