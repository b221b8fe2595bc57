use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tinyurl_core::repository::{Result, UrlMapping, UrlMappingRepository};
use tinyurl_core::{NormalizedUrl, ShortCode, StorageError};

/// In-memory implementation of [`UrlMappingRepository`] using DashMap.
///
/// Mappings are indexed both by short code and by long URL. A save holds the
/// long URL slot while claiming the short code slot, so the two unique
/// constraints are checked and applied as one step.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    by_code: DashMap<ShortCode, UrlMapping>,
    by_long: DashMap<NormalizedUrl, ShortCode>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory repository with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            by_code: DashMap::with_capacity(capacity),
            by_long: DashMap::with_capacity(capacity),
        }
    }

    /// Number of stored mappings.
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

#[async_trait]
impl UrlMappingRepository for InMemoryRepository {
    async fn exists_by_short_code(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.by_code.contains_key(code))
    }

    async fn find_by_short_code(&self, code: &ShortCode) -> Result<Option<UrlMapping>> {
        Ok(self.by_code.get(code).map(|entry| entry.value().clone()))
    }

    async fn find_by_long_url(&self, url: &NormalizedUrl) -> Result<Option<UrlMapping>> {
        let Some(code) = self.by_long.get(url).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        Ok(self.by_code.get(&code).map(|entry| entry.value().clone()))
    }

    async fn save(&self, mapping: &UrlMapping) -> Result<()> {
        // Lock order is always long URL, then short code.
        let Entry::Vacant(long_slot) = self.by_long.entry(mapping.long_url.clone()) else {
            return Err(StorageError::Conflict(format!(
                "long url already mapped: {}",
                mapping.long_url
            )));
        };
        let Entry::Vacant(code_slot) = self.by_code.entry(mapping.short_code.clone()) else {
            return Err(StorageError::Conflict(format!(
                "short code already allocated: {}",
                mapping.short_code
            )));
        };

        code_slot.insert(mapping.clone());
        long_slot.insert(mapping.short_code.clone());
        Ok(())
    }

    async fn short_code_page(
        &self,
        after: Option<&ShortCode>,
        limit: usize,
    ) -> Result<Vec<ShortCode>> {
        let mut codes: Vec<ShortCode> = self
            .by_code
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|code| after.map_or(true, |after| code > after))
            .collect();
        codes.sort_unstable();
        codes.truncate(limit);
        Ok(codes)
    }
}
