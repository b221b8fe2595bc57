//! Persistent stores for URL mappings.
//!
//! Both implementations enforce uniqueness of the short code and of the
//! normalized long URL, and report a violation of either as
//! [`StorageError::Conflict`](tinyurl_core::StorageError::Conflict).

pub mod memory;
pub mod mysql;

pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;

/// Schema of the `url_mappings` table.
pub const MYSQL_SCHEMA: &str = include_str!("../ddl/mysql/url_mappings.sql");
