//! Redis-backed Bloom filter shared by every process.
//!
//! The filter is a plain Redis bitmap under `{name}` plus a hash at
//! `{name}:config` holding its geometry and a `ready` flag. Bit positions come
//! from double hashing over SHA-256 of the short code, so any process with the
//! same geometry computes the same positions.
//!
//! The first process to touch the filter registers its geometry. Every later
//! handle adopts the registered geometry before reading or writing a single
//! bit, whatever sizing it was configured with.

use crate::bloom_filter::BloomFilterConfig;
use crate::redis::map_redis_error;
use crate::warmup;
use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tinyurl_core::filter::Result;
use tinyurl_core::{CacheError, ExistenceFilter, ShortCode, UrlMappingRepository};
use tracing::{debug, info, warn};

/// Default Redis key of the shared filter.
pub const DEFAULT_FILTER_NAME: &str = "tinyurl:filter";

/// Default bound on a single filter round trip.
pub const DEFAULT_FILTER_TIMEOUT: Duration = Duration::from_secs(1);

/// Largest bitmap Redis can hold (512 MiB).
const MAX_BITS: u64 = 1 << 32;

/// Size and hash count of a Bloom filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloomGeometry {
    pub bits: u64,
    pub hashes: u32,
}

impl BloomGeometry {
    /// Computes the optimal geometry for `expected_items` at the given false
    /// positive rate.
    pub fn optimal(expected_items: usize, false_positive_rate: f64) -> Result<Self> {
        if expected_items == 0 {
            return Err(CacheError::Initialization(
                "expected items must be greater than zero".into(),
            ));
        }
        if !(false_positive_rate > 0.0 && false_positive_rate < 1.0) {
            return Err(CacheError::Initialization(format!(
                "false positive rate must be in (0, 1), got {false_positive_rate}"
            )));
        }

        let n = expected_items as f64;
        let ln2 = std::f64::consts::LN_2;
        let bits = (-n * false_positive_rate.ln() / (ln2 * ln2)).ceil() as u64;
        let bits = bits.clamp(1, MAX_BITS);
        let hashes = ((bits as f64 / n) * ln2).round().max(1.0) as u32;

        Ok(Self { bits, hashes })
    }

    /// Bit offsets for `code`.
    pub fn positions(&self, code: &ShortCode) -> Vec<u64> {
        let digest = Sha256::digest(code.as_str().as_bytes());
        let mut first = [0u8; 8];
        let mut second = [0u8; 8];
        first.copy_from_slice(&digest[..8]);
        second.copy_from_slice(&digest[8..16]);

        let h1 = u64::from_be_bytes(first);
        // An odd step never collapses onto a single offset.
        let h2 = u64::from_be_bytes(second) | 1;

        (0..u64::from(self.hashes))
            .map(|i| h1.wrapping_add(i.wrapping_mul(h2)) % self.bits)
            .collect()
    }

    fn from_stored(bits: Option<u64>, hashes: Option<u32>) -> Option<Self> {
        match (bits, hashes) {
            (Some(bits), Some(hashes)) if bits > 0 && hashes > 0 => Some(Self { bits, hashes }),
            _ => None,
        }
    }
}

/// An [`ExistenceFilter`] stored in Redis and shared across processes.
///
/// Only one process needs to warm the filter up: once the `ready` flag is set
/// in the config hash, later processes are warm immediately. Every Redis round
/// trip is bounded by a timeout; failed or timed-out lookups answer "may
/// exist".
pub struct RedisExistenceFilter {
    conn: redis::aio::MultiplexedConnection,
    name: String,
    config_key: String,
    requested: BloomGeometry,
    /// The registered geometry, once read back from `{name}:config`.
    adopted: RwLock<Option<BloomGeometry>>,
    page_size: usize,
    timeout: Duration,
    warm: AtomicBool,
    initializing: AtomicBool,
}

impl RedisExistenceFilter {
    /// Creates a filter handle under [`DEFAULT_FILTER_NAME`].
    pub fn new(conn: redis::aio::MultiplexedConnection, config: BloomFilterConfig) -> Result<Self> {
        Self::with_name(conn, DEFAULT_FILTER_NAME, config)
    }

    /// Creates a filter handle under a custom key.
    pub fn with_name(
        conn: redis::aio::MultiplexedConnection,
        name: impl Into<String>,
        config: BloomFilterConfig,
    ) -> Result<Self> {
        let name = name.into();
        let requested = BloomGeometry::optimal(config.expected_items, config.false_positive_rate)?;
        Ok(Self {
            conn,
            config_key: format!("{name}:config"),
            name,
            requested,
            adopted: RwLock::new(None),
            page_size: config.page_size,
            timeout: DEFAULT_FILTER_TIMEOUT,
            warm: AtomicBool::new(false),
            initializing: AtomicBool::new(false),
        })
    }

    /// Overrides the per-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The geometry this handle hashes with: the registered one once known,
    /// otherwise the one derived from its own config.
    pub fn geometry(&self) -> BloomGeometry {
        (*self.adopted.read()).unwrap_or(self.requested)
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    filter = %self.name,
                    operation,
                    timeout = ?self.timeout,
                    "Filter call timed out"
                );
                Err(CacheError::Timeout(format!(
                    "{operation} exceeded {:?}",
                    self.timeout
                )))
            }
        }
    }

    /// Returns the registered geometry, reading or registering it first if
    /// this handle has not seen it yet.
    async fn resolved_geometry(&self) -> Result<BloomGeometry> {
        let adopted = *self.adopted.read();
        if let Some(geometry) = adopted {
            return Ok(geometry);
        }
        let (geometry, _) = self.claim_config().await?;
        Ok(geometry)
    }

    /// Registers this handle's geometry unless one is already registered, then
    /// adopts whatever is stored. Returns the geometry and whether the filter
    /// has been fully loaded.
    async fn claim_config(&self) -> Result<(BloomGeometry, bool)> {
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("HSETNX")
            .arg(&self.config_key)
            .arg("bits")
            .arg(self.requested.bits)
            .ignore()
            .cmd("HSETNX")
            .arg(&self.config_key)
            .arg("hashes")
            .arg(self.requested.hashes)
            .ignore()
            .cmd("HMGET")
            .arg(&self.config_key)
            .arg("bits")
            .arg("hashes")
            .arg("ready");

        let mut conn = self.conn.clone();
        let ((bits, hashes, ready),): ((Option<u64>, Option<u32>, Option<String>),) = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("failed to read filter config", e))?;

        let stored = BloomGeometry::from_stored(bits, hashes).ok_or_else(|| {
            CacheError::InvalidData(format!(
                "filter {} has a corrupt config: bits={bits:?} hashes={hashes:?}",
                self.name
            ))
        })?;
        if stored != self.requested {
            warn!(
                filter = %self.name,
                registered = ?stored,
                configured = ?self.requested,
                "Shared filter exists with a different geometry, adopting the registered one"
            );
        }
        *self.adopted.write() = Some(stored);

        Ok((stored, ready.as_deref() == Some("1")))
    }

    async fn set_bits(&self, codes: &[ShortCode]) -> Result<()> {
        if codes.is_empty() {
            return Ok(());
        }

        let geometry = self.resolved_geometry().await?;
        let mut pipe = redis::pipe();
        for code in codes {
            for position in geometry.positions(code) {
                pipe.cmd("SETBIT").arg(&self.name).arg(position).arg(1).ignore();
            }
        }

        let mut conn = self.conn.clone();
        let () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("failed to set filter bits", e))?;
        Ok(())
    }

    async fn any_bit_clear(&self, code: &ShortCode) -> Result<bool> {
        let geometry = self.resolved_geometry().await?;
        let mut pipe = redis::pipe();
        for position in geometry.positions(code) {
            pipe.cmd("GETBIT").arg(&self.name).arg(position);
        }

        let mut conn = self.conn.clone();
        let bits: Vec<i64> = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("failed to read filter bits", e))?;
        Ok(bits.iter().any(|bit| *bit == 0))
    }

    async fn mark_ready(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let () = redis::cmd("HSET")
            .arg(&self.config_key)
            .arg("ready")
            .arg(1)
            .query_async(&mut conn)
            .await
            .map(|_: i64| ())
            .map_err(|e| map_redis_error("failed to mark filter ready", e))?;
        Ok(())
    }

    async fn load(&self, repository: &dyn UrlMappingRepository) -> Result<()> {
        let (geometry, ready) = self.bounded("claim filter config", self.claim_config()).await?;
        if ready {
            info!(filter = %self.name, "Shared filter already loaded");
            self.warm.store(true, Ordering::Release);
            return Ok(());
        }

        info!(
            filter = %self.name,
            bits = geometry.bits,
            hashes = geometry.hashes,
            "Loading existing short codes into shared filter"
        );
        let loaded = warmup::load_from_store(self, repository, self.page_size).await?;
        self.bounded("mark filter ready", self.mark_ready()).await?;
        self.warm.store(true, Ordering::Release);
        info!(filter = %self.name, loaded, "Shared filter is warm");
        Ok(())
    }
}

impl std::fmt::Debug for RedisExistenceFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisExistenceFilter")
            .field("name", &self.name)
            .field("geometry", &self.geometry())
            .field("timeout", &self.timeout)
            .field("warm", &self.is_warm())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ExistenceFilter for RedisExistenceFilter {
    async fn definitely_not_exist(&self, code: &ShortCode) -> bool {
        match self.bounded("filter lookup", self.any_bit_clear(code)).await {
            Ok(absent) => {
                debug!(code = %code, absent, "Checked shared filter");
                absent
            }
            Err(e) => {
                warn!(code = %code, error = %e, "Filter lookup failed, assuming code may exist");
                false
            }
        }
    }

    async fn add(&self, code: &ShortCode) -> Result<()> {
        self.bounded("filter add", self.set_bits(std::slice::from_ref(code)))
            .await
    }

    async fn add_batch(&self, codes: &[ShortCode]) -> Result<()> {
        self.bounded("filter batch add", self.set_bits(codes)).await
    }

    fn is_warm(&self) -> bool {
        self.warm.load(Ordering::Acquire)
    }

    async fn initialize(&self, repository: &dyn UrlMappingRepository) -> Result<()> {
        if self.is_warm()
            || self
                .initializing
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return Ok(());
        }

        let result = self.load(repository).await;
        if let Err(e) = &result {
            self.initializing.store(false, Ordering::Release);
            warn!(filter = %self.name, error = %e, "Shared filter warm-up failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_for_default_sizing() {
        let geometry = BloomGeometry::optimal(10_000_000, 0.001).unwrap();
        // About 14.4 bits and 10 hashes per item.
        assert!((143_000_000..145_000_000).contains(&geometry.bits));
        assert_eq!(geometry.hashes, 10);
    }

    #[test]
    fn geometry_is_capped_at_redis_limit() {
        let geometry = BloomGeometry::optimal(usize::MAX / 2, 0.000_001).unwrap();
        assert_eq!(geometry.bits, MAX_BITS);
        assert!(geometry.hashes >= 1);
    }

    #[test]
    fn geometry_rejects_bad_input() {
        assert!(BloomGeometry::optimal(0, 0.01).is_err());
        assert!(BloomGeometry::optimal(100, 0.0).is_err());
        assert!(BloomGeometry::optimal(100, 1.0).is_err());
    }

    #[test]
    fn stored_geometry_must_be_complete() {
        assert_eq!(
            BloomGeometry::from_stored(Some(1_000), Some(7)),
            Some(BloomGeometry { bits: 1_000, hashes: 7 })
        );
        assert_eq!(BloomGeometry::from_stored(Some(1_000), None), None);
        assert_eq!(BloomGeometry::from_stored(None, Some(7)), None);
        assert_eq!(BloomGeometry::from_stored(Some(0), Some(7)), None);
    }

    #[test]
    fn positions_are_deterministic_and_in_range() {
        let geometry = BloomGeometry::optimal(1_000, 0.01).unwrap();
        let code = ShortCode::new_unchecked("abcdefghi");

        let positions = geometry.positions(&code);
        assert_eq!(positions.len(), geometry.hashes as usize);
        assert!(positions.iter().all(|p| *p < geometry.bits));
        assert_eq!(positions, geometry.positions(&code));
        assert_ne!(
            positions,
            geometry.positions(&ShortCode::new_unchecked("abcdefghj"))
        );
    }
}
