use crate::config::AllocatorConfig;
use crate::error::{AllocatorError, Result};
use crate::observer::{AllocatorEvent, AllocatorObserver, NoopObserver};
use crate::UrlAllocator;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tinyurl_cache::TieredCache;
use tinyurl_core::{
    CacheError, ExistenceFilter, Lookup, Namespace, NormalizedUrl, ShortCode, StorageError,
    UrlMapping, UrlMappingRepository,
};
use tinyurl_generator::CodeGenerator;
use tracing::{debug, error, info, warn};

/// Outcome of probing a single candidate code.
enum Probe {
    /// The candidate was persisted for this URL.
    Accepted,
    /// The URL is already mapped, possibly by a concurrent request.
    Mapped(ShortCode),
    /// The candidate belongs to someone else; try the next salt.
    Collision,
}

/// The allocation engine.
///
/// Checks are ordered cheapest first (filter, cache, store), and the store's
/// unique constraints settle every race. The filter and the cache are only
/// updated after a mapping is durably saved.
pub struct Allocator<R, G> {
    repository: Arc<R>,
    generator: Arc<G>,
    filter: Arc<dyn ExistenceFilter>,
    cache: TieredCache,
    observer: Arc<dyn AllocatorObserver>,
    config: AllocatorConfig,
}

impl<R, G> Clone for Allocator<R, G> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            generator: self.generator.clone(),
            filter: self.filter.clone(),
            cache: self.cache.clone(),
            observer: self.observer.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R: UrlMappingRepository, G: CodeGenerator> Allocator<R, G> {
    pub fn new(
        repository: R,
        generator: G,
        filter: Arc<dyn ExistenceFilter>,
        cache: TieredCache,
        config: AllocatorConfig,
    ) -> Self {
        Self {
            repository: Arc::new(repository),
            generator: Arc::new(generator),
            filter,
            cache,
            observer: Arc::new(NoopObserver),
            config,
        }
    }

    /// Replaces the observer that receives allocator events.
    pub fn with_observer(mut self, observer: Arc<dyn AllocatorObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn filter(&self) -> &dyn ExistenceFilter {
        self.filter.as_ref()
    }

    pub fn cache(&self) -> &TieredCache {
        &self.cache
    }

    /// Loads every stored code into the existence filter.
    ///
    /// Allocation stays correct while this runs; it only makes resolves of
    /// unknown codes cheaper once it completes.
    pub async fn warm_up_filter(&self) -> std::result::Result<(), CacheError> {
        self.filter.initialize(self.repository.as_ref()).await
    }

    /// See [`UrlAllocator::create_short_url`].
    pub async fn create(&self, long_url: &str) -> Result<ShortCode> {
        let url = NormalizedUrl::parse(long_url)?;

        if let Some(code) = self.cached_code(&url).await {
            debug!(url = %url, code = %code, "Short code served from cache");
            self.observe(AllocatorEvent::CreateCacheHit);
            return Ok(code);
        }

        if let Some(existing) = self.bounded(self.repository.find_by_long_url(&url)).await? {
            debug!(url = %url, code = %existing.short_code, "Short code served from store");
            self.observe(AllocatorEvent::CreateStoreHit);
            self.cache.dual_put(&existing.short_code, &url).await;
            return Ok(existing.short_code);
        }

        for salt in 0..self.config.collision_limit {
            let code = self.generator.generate(&url, salt);
            match self.probe(&code, &url).await? {
                Probe::Accepted => {
                    info!(url = %url, code = %code, salt, "Allocated short code");
                    self.observe(AllocatorEvent::CreateGenerated);
                    return Ok(code);
                }
                Probe::Mapped(winner) => {
                    self.observe(AllocatorEvent::CreateStoreHit);
                    return Ok(winner);
                }
                Probe::Collision => {
                    warn!(url = %url, code = %code, salt, "Short code collision");
                    self.observe(AllocatorEvent::CreateCollision);
                }
            }
        }

        error!(
            url = %url,
            attempts = self.config.collision_limit,
            "Exhausted short code candidates"
        );
        self.observe(AllocatorEvent::CreateExhausted);
        Err(AllocatorError::Exhausted {
            attempts: self.config.collision_limit,
        })
    }

    /// See [`UrlAllocator::resolve_short_url`].
    pub async fn resolve(&self, short_code: &str) -> Result<NormalizedUrl> {
        let code = ShortCode::new(short_code)?;

        // A cold filter may be missing stored codes.
        if self.filter.is_warm() && self.filter.definitely_not_exist(&code).await {
            debug!(code = %code, "Rejected by existence filter");
            self.observe(AllocatorEvent::ResolveFilterReject);
            return Err(AllocatorError::NotFound(code.to_string()));
        }

        match self.cache.get(Namespace::ShortToLong, code.as_str()).await {
            Lookup::Hit(url) => {
                self.observe(AllocatorEvent::ResolveCacheHit);
                return Ok(NormalizedUrl::from_normalized(url));
            }
            Lookup::NegativeHit => {
                self.observe(AllocatorEvent::ResolveCacheHit);
                self.observe(AllocatorEvent::ResolveNotFound);
                return Err(AllocatorError::NotFound(code.to_string()));
            }
            Lookup::Miss => self.observe(AllocatorEvent::ResolveCacheMiss),
        }

        match self.bounded(self.repository.find_by_short_code(&code)).await? {
            Some(mapping) => {
                self.observe(AllocatorEvent::ResolveStoreHit);
                self.cache
                    .dual_put(&mapping.short_code, &mapping.long_url)
                    .await;
                Ok(mapping.long_url)
            }
            None => {
                self.observe(AllocatorEvent::ResolveNotFound);
                self.cache.put_absent(&code).await;
                Err(AllocatorError::NotFound(code.to_string()))
            }
        }
    }

    async fn cached_code(&self, url: &NormalizedUrl) -> Option<ShortCode> {
        let Lookup::Hit(raw) = self.cache.get(Namespace::LongToShort, url.as_str()).await else {
            return None;
        };
        match ShortCode::new(raw) {
            Ok(code) => Some(code),
            Err(e) => {
                warn!(url = %url, error = %e, "Ignoring malformed cached short code");
                None
            }
        }
    }

    async fn probe(&self, code: &ShortCode, url: &NormalizedUrl) -> Result<Probe> {
        if !self.filter.definitely_not_exist(code).await {
            debug!(code = %code, "Filter reports code may exist");
            return Ok(Probe::Collision);
        }
        if self.bounded(self.repository.exists_by_short_code(code)).await? {
            return Ok(Probe::Collision);
        }

        let mapping = UrlMapping::new(code.clone(), url.clone());
        let saved =
            tokio::time::timeout(self.config.store_timeout, self.repository.save(&mapping)).await;

        match saved {
            Ok(Ok(())) => {
                self.publish(code, url).await;
                Ok(Probe::Accepted)
            }
            Ok(Err(StorageError::Conflict(reason))) => {
                debug!(code = %code, url = %url, reason = %reason, "Lost insert race");
                match self.bounded(self.repository.find_by_long_url(url)).await? {
                    Some(winner) => {
                        self.publish(&winner.short_code, url).await;
                        Ok(Probe::Mapped(winner.short_code))
                    }
                    None => Ok(Probe::Collision),
                }
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                warn!(code = %code, url = %url, "Save timed out, checking whether it landed");
                match self.bounded(self.repository.find_by_long_url(url)).await? {
                    Some(stored) if stored.short_code == *code => {
                        self.publish(code, url).await;
                        Ok(Probe::Accepted)
                    }
                    Some(stored) => {
                        self.publish(&stored.short_code, url).await;
                        Ok(Probe::Mapped(stored.short_code))
                    }
                    None => Err(AllocatorError::Storage(StorageError::Timeout(format!(
                        "save of {code} did not complete within {:?}",
                        self.config.store_timeout
                    )))),
                }
            }
        }
    }

    /// Makes a durably saved mapping visible to the filter and the cache.
    async fn publish(&self, code: &ShortCode, url: &NormalizedUrl) {
        if let Err(e) = self.filter.add(code).await {
            warn!(code = %code, error = %e, "Failed to add code to existence filter");
        }
        self.cache.dual_put(code, url).await;
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, StorageError>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.store_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(AllocatorError::Storage(StorageError::Timeout(format!(
                "store call exceeded {:?}",
                self.config.store_timeout
            )))),
        }
    }

    fn observe(&self, event: AllocatorEvent) {
        self.observer.observe(event);
    }
}

#[async_trait]
impl<R: UrlMappingRepository, G: CodeGenerator> UrlAllocator for Allocator<R, G> {
    async fn create_short_url(&self, long_url: &str) -> Result<ShortCode> {
        self.create(long_url).await
    }

    async fn resolve_short_url(&self, short_code: &str) -> Result<NormalizedUrl> {
        self.resolve(short_code).await
    }
}
