use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tinyurl_core::cache::Result;
use tinyurl_core::{CacheError, CacheTier, CacheValue, Lookup, Namespace};
use tracing::{debug, trace, warn};

/// Default key prefix for cache entries.
pub const DEFAULT_KEY_PREFIX: &str = "tinyurl:";

/// Default time-to-live of shared entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// A Redis-backed cache tier.
///
/// Values are stored as plain strings under `{prefix}{namespace}:{key}` with
/// an expiry. A negative entry is stored as the reserved sentinel string.
#[derive(Debug, Clone)]
pub struct RedisTier {
    conn: redis::aio::MultiplexedConnection,
    key_prefix: String,
    ttl: Duration,
}

pub(crate) fn map_redis_error(operation: &str, err: redis::RedisError) -> CacheError {
    let message = format!("{operation}: {err}");
    if message.to_ascii_lowercase().contains("timed out") {
        CacheError::Timeout(message)
    } else {
        CacheError::Operation(message)
    }
}

impl RedisTier {
    /// Creates a Redis tier with the default prefix and TTL.
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self::with_prefix(conn, DEFAULT_KEY_PREFIX)
    }

    /// Creates a Redis tier with a custom key prefix (e.g. `"myapp:"`).
    pub fn with_prefix(
        conn: redis::aio::MultiplexedConnection,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
            ttl: DEFAULT_TTL,
        }
    }

    /// Overrides the entry TTL.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn cache_key(&self, namespace: Namespace, key: &str) -> String {
        format!("{}{}", self.key_prefix, namespace.key(key))
    }
}

#[async_trait]
impl CacheTier for RedisTier {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, namespace: Namespace, key: &str) -> Result<Lookup> {
        let cache_key = self.cache_key(namespace, key);
        let mut conn = self.conn.clone();

        match conn.get::<_, Option<String>>(&cache_key).await {
            Ok(Some(raw)) => {
                debug!(namespace = %namespace, key, "Cache hit in Redis");
                Ok(CacheValue::decode(raw).into())
            }
            Ok(None) => {
                trace!(namespace = %namespace, key, "Cache miss in Redis");
                Ok(Lookup::Miss)
            }
            Err(e) => {
                warn!(namespace = %namespace, key, error = %e, "Redis error on get");
                Err(map_redis_error("failed to fetch value from Redis", e))
            }
        }
    }

    async fn put(&self, namespace: Namespace, key: &str, value: &CacheValue) -> Result<()> {
        let cache_key = self.cache_key(namespace, key);
        let mut conn = self.conn.clone();

        // SETEX rejects a zero expiry.
        let seconds = self.ttl.as_secs().max(1);
        match conn
            .set_ex::<_, _, ()>(&cache_key, value.encode(), seconds)
            .await
        {
            Ok(()) => {
                trace!(namespace = %namespace, key, "Cached value in Redis");
                Ok(())
            }
            Err(e) => {
                warn!(namespace = %namespace, key, error = %e, "Failed to cache value in Redis");
                Err(map_redis_error("failed to write value to Redis", e))
            }
        }
    }
}
