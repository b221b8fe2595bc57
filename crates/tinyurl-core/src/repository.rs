use crate::error::StorageError;
use crate::long_url::NormalizedUrl;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// The persisted mapping between a short code and a long URL.
///
/// A mapping is written once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlMapping {
    pub short_code: ShortCode,
    pub long_url: NormalizedUrl,
    pub created_at: Timestamp,
}

impl UrlMapping {
    /// Creates a mapping stamped with the current time.
    pub fn new(short_code: ShortCode, long_url: NormalizedUrl) -> Self {
        Self {
            short_code,
            long_url,
            created_at: Timestamp::now(),
        }
    }
}

/// The persistent store of URL mappings.
///
/// The store is the only authority on uniqueness: both `short_code` and
/// `long_url` carry unique constraints, and [`save`](Self::save) reports a
/// violation of either as [`StorageError::Conflict`].
#[async_trait]
pub trait UrlMappingRepository: Send + Sync + 'static {
    /// Checks whether a short code is already allocated.
    async fn exists_by_short_code(&self, code: &ShortCode) -> Result<bool>;

    /// Retrieves the mapping for a short code.
    async fn find_by_short_code(&self, code: &ShortCode) -> Result<Option<UrlMapping>>;

    /// Retrieves the mapping for a normalized long URL.
    async fn find_by_long_url(&self, url: &NormalizedUrl) -> Result<Option<UrlMapping>>;

    /// Persists a new mapping. Returns `Err(Conflict)` if the short code or the
    /// long URL is already present.
    async fn save(&self, mapping: &UrlMapping) -> Result<()>;

    /// Returns up to `limit` short codes strictly greater than `after`, in
    /// ascending order.
    async fn short_code_page(
        &self,
        after: Option<&ShortCode>,
        limit: usize,
    ) -> Result<Vec<ShortCode>>;
}

/// A lazy, paginated scan over every allocated short code.
///
/// Pages are fetched one at a time with keyset pagination, so the scan stays
/// cheap regardless of table size and tolerates concurrent inserts.
pub struct ShortCodePages<'a> {
    repository: &'a dyn UrlMappingRepository,
    page_size: usize,
    cursor: Option<ShortCode>,
    exhausted: bool,
}

impl<'a> ShortCodePages<'a> {
    pub fn new(repository: &'a dyn UrlMappingRepository, page_size: usize) -> Self {
        Self {
            repository,
            page_size: page_size.max(1),
            cursor: None,
            exhausted: false,
        }
    }

    /// Fetches the next page. Returns `Ok(None)` once every code has been seen.
    pub async fn next_page(&mut self) -> Result<Option<Vec<ShortCode>>> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self
            .repository
            .short_code_page(self.cursor.as_ref(), self.page_size)
            .await?;

        if page.len() < self.page_size {
            self.exhausted = true;
        }
        if page.is_empty() {
            return Ok(None);
        }

        self.cursor = page.last().cloned();
        Ok(Some(page))
    }
}

/// Starts a paginated scan over all short codes in `repository`.
pub fn scan_short_codes(
    repository: &dyn UrlMappingRepository,
    page_size: usize,
) -> ShortCodePages<'_> {
    ShortCodePages::new(repository, page_size)
}
