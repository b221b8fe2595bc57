//! In-process Bloom filter over allocated short codes.
//!
//! The filter lives in memory of a single process, so every process warms up
//! its own copy from the store on start. Until that warm-up completes
//! [`ExistenceFilter::is_warm`] reports `false` and callers fall through to the
//! store.

use crate::warmup;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tinyurl_core::filter::Result;
use tinyurl_core::{CacheError, ExistenceFilter, ShortCode, UrlMappingRepository};
use tracing::{info, warn};
use typed_builder::TypedBuilder;

/// Default number of codes the filter is sized for.
pub const DEFAULT_EXPECTED_ITEMS: usize = 10_000_000;

/// Default target false positive rate.
pub const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.001;

/// Default number of codes read per page during warm-up.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Configuration for the Bloom filter.
///
/// The filter trades a small false positive rate for significant memory
/// savings. Sizing is fixed at construction.
#[derive(Debug, Clone, TypedBuilder)]
pub struct BloomFilterConfig {
    /// Expected number of codes to be inserted into the filter.
    ///
    /// Setting this too low raises the false positive rate once the filter
    /// fills up.
    #[builder(default = DEFAULT_EXPECTED_ITEMS)]
    pub expected_items: usize,

    /// Desired false positive rate as a probability between 0.0 and 1.0.
    #[builder(default = DEFAULT_FALSE_POSITIVE_RATE)]
    pub false_positive_rate: f64,

    /// Page size used when loading existing codes from the store.
    #[builder(default = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
}

impl Default for BloomFilterConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// An [`ExistenceFilter`] backed by an in-memory Bloom filter.
pub struct BloomExistenceFilter {
    bloom: RwLock<bloomfilter::Bloom<ShortCode>>,
    page_size: usize,
    warm: AtomicBool,
    initializing: AtomicBool,
}

impl BloomExistenceFilter {
    /// Creates an empty, cold filter.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Initialization` if the sizing parameters are
    /// rejected.
    pub fn new(config: BloomFilterConfig) -> Result<Self> {
        let bloom =
            bloomfilter::Bloom::new_for_fp_rate(config.expected_items, config.false_positive_rate)
                .map_err(|e| CacheError::Initialization(e.to_string()))?;
        Ok(Self {
            bloom: RwLock::new(bloom),
            page_size: config.page_size,
            warm: AtomicBool::new(false),
            initializing: AtomicBool::new(false),
        })
    }
}

impl std::fmt::Debug for BloomExistenceFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomExistenceFilter")
            .field("page_size", &self.page_size)
            .field("warm", &self.is_warm())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ExistenceFilter for BloomExistenceFilter {
    async fn definitely_not_exist(&self, code: &ShortCode) -> bool {
        !self.bloom.read().check(code)
    }

    async fn add(&self, code: &ShortCode) -> Result<()> {
        self.bloom.write().set(code);
        Ok(())
    }

    async fn add_batch(&self, codes: &[ShortCode]) -> Result<()> {
        let mut guard = self.bloom.write();
        for code in codes {
            guard.set(code);
        }
        Ok(())
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

        info!(page_size = self.page_size, "Loading existing short codes into Bloom filter");
        match warmup::load_from_store(self, repository, self.page_size).await {
            Ok(loaded) => {
                self.warm.store(true, Ordering::Release);
                info!(loaded, "Bloom filter is warm");
                Ok(())
            }
            Err(e) => {
                // Allow a later retry.
                self.initializing.store(false, Ordering::Release);
                warn!(error = %e, "Bloom filter warm-up failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinyurl_core::{NormalizedUrl, UrlMapping};
    use tinyurl_storage::InMemoryRepository;

    fn small_filter() -> BloomExistenceFilter {
        BloomExistenceFilter::new(
            BloomFilterConfig::builder()
                .expected_items(10_000)
                .false_positive_rate(0.001)
                .page_size(100)
                .build(),
        )
        .unwrap()
    }

    fn code(i: usize) -> ShortCode {
        ShortCode::new_unchecked(format!("c{i:08}"))
    }

    #[tokio::test]
    async fn added_codes_are_never_reported_absent() {
        let filter = small_filter();
        for i in 0..1_000 {
            filter.add(&code(i)).await.unwrap();
        }
        for i in 0..1_000 {
            assert!(!filter.definitely_not_exist(&code(i)).await);
        }
    }

    #[tokio::test]
    async fn false_positive_rate_stays_near_target() {
        let filter = small_filter();
        let codes: Vec<_> = (0..10_000).map(code).collect();
        filter.add_batch(&codes).await.unwrap();

        let mut false_positives = 0;
        for i in 10_000..110_000 {
            if !filter.definitely_not_exist(&code(i)).await {
                false_positives += 1;
            }
        }
        // 0.1% of 100k probes is 100; allow generous slack.
        assert!(false_positives <= 200, "false positives: {false_positives}");
    }

    #[tokio::test]
    async fn starts_cold() {
        let filter = small_filter();
        assert!(!filter.is_warm());
        assert!(filter.definitely_not_exist(&code(1)).await);
    }

    #[tokio::test]
    async fn initialize_loads_every_stored_code() {
        let repository = InMemoryRepository::new();
        for i in 0..250 {
            let mapping = UrlMapping::new(
                code(i),
                NormalizedUrl::parse(&format!("example.com/{i}")).unwrap(),
            );
            repository.save(&mapping).await.unwrap();
        }

        let filter = small_filter();
        filter.initialize(&repository).await.unwrap();

        assert!(filter.is_warm());
        for i in 0..250 {
            assert!(!filter.definitely_not_exist(&code(i)).await);
        }
    }

    #[tokio::test]
    async fn initialize_of_empty_store_is_warm() {
        let filter = small_filter();
        filter
            .initialize(&InMemoryRepository::new())
            .await
            .unwrap();
        assert!(filter.is_warm());
    }

    #[tokio::test]
    async fn initialize_is_a_no_op_once_warm() {
        let repository = InMemoryRepository::new();
        let filter = small_filter();
        filter.initialize(&repository).await.unwrap();

        let late = UrlMapping::new(code(7), NormalizedUrl::parse("example.com/late").unwrap());
        repository.save(&late).await.unwrap();
        filter.initialize(&repository).await.unwrap();

        // Codes added after warm-up must come through `add`, not a reload.
        assert!(filter.definitely_not_exist(&code(7)).await);
    }
}
