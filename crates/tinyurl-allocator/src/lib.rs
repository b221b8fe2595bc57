//! Short-code allocation engine.
//!
//! [`Allocator`] turns long URLs into short codes and back. It sits on top of
//! a persistent store (the only source of truth), a [`TieredCache`] and an
//! [`ExistenceFilter`], and reports what it does to an [`AllocatorObserver`].
//!
//! [`TieredCache`]: tinyurl_cache::TieredCache
//! [`ExistenceFilter`]: tinyurl_core::ExistenceFilter

pub mod allocator;
pub mod config;
pub mod error;
pub mod observer;

pub use allocator::Allocator;
pub use config::AllocatorConfig;
pub use error::{AllocatorError, Result};
pub use observer::{
    AllocatorEvent, AllocatorObserver, CountingObserver, MetricsObserver, NoopObserver,
};

use async_trait::async_trait;
use tinyurl_core::{NormalizedUrl, ShortCode};

/// The operations exposed to transports.
#[async_trait]
pub trait UrlAllocator: Send + Sync + 'static {
    /// Returns the short code for `long_url`, allocating one if needed.
    ///
    /// Calling this twice with the same URL yields the same code.
    async fn create_short_url(&self, long_url: &str) -> Result<ShortCode>;

    /// Returns the normalized long URL behind `short_code`.
    async fn resolve_short_url(&self, short_code: &str) -> Result<NormalizedUrl>;
}
