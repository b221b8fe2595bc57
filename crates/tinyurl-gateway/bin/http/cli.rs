use clap::{Parser, ValueEnum};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

pub const LISTEN_ADDR_ENV: &str = "TINYURL_LISTEN_ADDR";
pub const BASE_URL_ENV: &str = "TINYURL_BASE_URL";
pub const STORAGE_BACKEND_ENV: &str = "TINYURL_STORAGE_BACKEND";
pub const MYSQL_DSN_ENV: &str = "TINYURL_MYSQL_DSN";
pub const REDIS_URL_ENV: &str = "TINYURL_REDIS_URL";
pub const L1_CAPACITY_ENV: &str = "TINYURL_L1_CAPACITY";
pub const L1_TTL_SECS_ENV: &str = "TINYURL_L1_TTL_SECS";
pub const L2_TTL_SECS_ENV: &str = "TINYURL_L2_TTL_SECS";
pub const COLLISION_LIMIT_ENV: &str = "TINYURL_COLLISION_LIMIT";
pub const FILTER_EXPECTED_ITEMS_ENV: &str = "TINYURL_FILTER_EXPECTED_ITEMS";
pub const FILTER_FP_RATE_ENV: &str = "TINYURL_FILTER_FP_RATE";
pub const LOG_JSON_ENV: &str = "TINYURL_LOG_JSON";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "tinyurl-gateway")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Public base of short URLs; derived from Host and X-Forwarded-Proto when unset.
    #[arg(long, env = BASE_URL_ENV)]
    pub base_url: Option<String>,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    /// Enables the shared Redis cache tier and the shared existence filter.
    #[arg(long, env = REDIS_URL_ENV)]
    pub redis_url: Option<String>,

    #[arg(long, env = L1_CAPACITY_ENV, default_value_t = tinyurl_cache::moka::DEFAULT_MAX_CAPACITY)]
    pub l1_capacity: u64,

    #[arg(
        long,
        env = L1_TTL_SECS_ENV,
        default_value_t = tinyurl_cache::moka::DEFAULT_TTL.as_secs(),
    )]
    pub l1_ttl_secs: u64,

    #[arg(
        long,
        env = L2_TTL_SECS_ENV,
        default_value_t = tinyurl_cache::redis::DEFAULT_TTL.as_secs(),
    )]
    pub l2_ttl_secs: u64,

    #[arg(
        long,
        env = COLLISION_LIMIT_ENV,
        default_value_t = tinyurl_allocator::config::DEFAULT_COLLISION_LIMIT
    )]
    pub collision_limit: u32,

    #[arg(
        long,
        env = FILTER_EXPECTED_ITEMS_ENV,
        default_value_t = tinyurl_cache::bloom_filter::DEFAULT_EXPECTED_ITEMS
    )]
    pub filter_expected_items: usize,

    #[arg(
        long,
        env = FILTER_FP_RATE_ENV,
        default_value_t = tinyurl_cache::bloom_filter::DEFAULT_FALSE_POSITIVE_RATE
    )]
    pub filter_fp_rate: f64,

    #[arg(long, env = LOG_JSON_ENV)]
    pub log_json: bool,
}
