//! Core types and traits for the TinyURL short-code allocation engine.
//!
//! This crate holds the domain types shared by every other crate and the
//! collaborator traits the allocator is written against: the persistent
//! store, the cache tiers, and the existence filter.

pub mod cache;
pub mod error;
pub mod filter;
pub mod long_url;
pub mod repository;
pub mod shortcode;

pub use cache::{CacheTier, CacheValue, Lookup, Namespace, NEGATIVE_SENTINEL};
pub use error::{CacheError, CoreError, StorageError};
pub use filter::ExistenceFilter;
pub use long_url::{NormalizedUrl, MAX_LONG_URL_LENGTH};
pub use repository::{scan_short_codes, ShortCodePages, UrlMapping, UrlMappingRepository};
pub use shortcode::{ShortCode, SHORT_CODE_LENGTH};
