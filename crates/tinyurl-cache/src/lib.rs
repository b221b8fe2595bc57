//! Cache tiers and existence filters for the TinyURL allocator.
//!
//! - [`TieredCache`] composes an ordered list of [`CacheTier`]s, typically a
//!   [`MokaTier`] in front of a [`RedisTier`].
//! - [`BloomExistenceFilter`] and [`RedisExistenceFilter`] implement
//!   [`ExistenceFilter`] for a single process and for a fleet respectively.
//!
//! [`CacheTier`]: tinyurl_core::CacheTier
//! [`ExistenceFilter`]: tinyurl_core::ExistenceFilter

pub mod bloom_filter;
pub mod moka;
pub mod redis;
pub mod redis_filter;
pub mod tiered;
mod warmup;

pub use self::moka::{MokaTier, MokaTierConfig};
pub use self::redis::RedisTier;
pub use bloom_filter::{BloomExistenceFilter, BloomFilterConfig};
pub use redis_filter::{BloomGeometry, RedisExistenceFilter};
pub use tiered::TieredCache;
