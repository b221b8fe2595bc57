use crate::error::CacheError;
use crate::repository::UrlMappingRepository;
use crate::shortcode::ShortCode;
use async_trait::async_trait;

/// Result type for filter maintenance operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// A probabilistic membership gate over allocated short codes.
///
/// Answers never produce false negatives: once a code has been added,
/// [`definitely_not_exist`](Self::definitely_not_exist) returns `false` for it.
/// False positives are allowed up to the configured rate. Codes are never
/// removed.
///
/// The filter is advisory. Until [`is_warm`](Self::is_warm) reports `true` it
/// may be missing codes that exist in the store, so callers must not treat a
/// negative answer from a cold filter as authoritative.
#[async_trait]
pub trait ExistenceFilter: Send + Sync + 'static {
    /// Returns `true` only if `code` has certainly never been added.
    ///
    /// Backend failures answer `false` ("may exist").
    async fn definitely_not_exist(&self, code: &ShortCode) -> bool;

    /// Adds a code. Idempotent.
    async fn add(&self, code: &ShortCode) -> Result<()>;

    /// Adds a batch of codes. Idempotent.
    async fn add_batch(&self, codes: &[ShortCode]) -> Result<()>;

    /// Whether a full warm-up from the store has completed (here or, for
    /// shared filters, by another process).
    fn is_warm(&self) -> bool;

    /// Sizes the filter and loads every allocated code from `repository`.
    ///
    /// Does nothing if the filter already exists. This is a best-effort
    /// warm-up and may run concurrently with allocations.
    async fn initialize(&self, repository: &dyn UrlMappingRepository) -> Result<()>;
}
