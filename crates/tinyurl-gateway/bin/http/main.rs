mod cli;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tinyurl_allocator::{Allocator, AllocatorConfig, MetricsObserver};
use tinyurl_cache::{
    BloomExistenceFilter, BloomFilterConfig, MokaTier, RedisExistenceFilter, RedisTier,
    TieredCache,
};
use tinyurl_core::{CacheTier, ExistenceFilter, UrlMappingRepository};
use tinyurl_gateway::warmup::spawn_filter_warm_up;
use tinyurl_gateway::{telemetry, App, AppState};
use tinyurl_generator::HashCodeGenerator;
use tinyurl_storage::{InMemoryRepository, MySqlRepository};
use tracing::info;

use crate::cli::{StorageBackendArg, CLI};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::try_parse()?;
    telemetry::init(config.log_json)?;

    info!(
        listen_addr = %config.listen_addr,
        storage_backend = %config.storage,
        redis = config.redis_url.is_some(),
        collision_limit = config.collision_limit,
        "starting tinyurl gateway"
    );

    let redis = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str()).context("invalid redis url")?;
            let conn = client
                .get_multiplexed_async_connection()
                .await
                .context("failed to connect to redis")?;
            Some(conn)
        }
        None => None,
    };

    let filter_config = BloomFilterConfig::builder()
        .expected_items(config.filter_expected_items)
        .false_positive_rate(config.filter_fp_rate)
        .build();

    let mut tiers: Vec<Arc<dyn CacheTier>> = vec![Arc::new(MokaTier::with_ttl(
        config.l1_capacity,
        Duration::from_secs(config.l1_ttl_secs),
    ))];
    let filter: Arc<dyn ExistenceFilter> = match redis {
        Some(conn) => {
            tiers.push(Arc::new(
                RedisTier::new(conn.clone()).ttl(Duration::from_secs(config.l2_ttl_secs)),
            ));
            Arc::new(RedisExistenceFilter::new(conn, filter_config)?)
        }
        None => Arc::new(BloomExistenceFilter::new(filter_config)?),
    };
    let cache = TieredCache::new(tiers);

    let allocator_config = AllocatorConfig::builder()
        .collision_limit(config.collision_limit)
        .build();

    match config.storage {
        StorageBackendArg::InMemory => {
            let allocator = Allocator::new(
                InMemoryRepository::new(),
                HashCodeGenerator::new(),
                filter,
                cache,
                allocator_config,
            );
            run_server(config.listen_addr, config.base_url, allocator).await?;
        }
        StorageBackendArg::Mysql => {
            let mysql_dsn = config
                .mysql_dsn
                .context("mysql dsn is required when storage backend is mysql")?;
            let repository = MySqlRepository::connect(&mysql_dsn).await?;
            repository.ensure_schema().await?;
            let allocator = Allocator::new(
                repository,
                HashCodeGenerator::new(),
                filter,
                cache,
                allocator_config,
            );
            run_server(config.listen_addr, config.base_url, allocator).await?;
        }
    }

    Ok(())
}

async fn run_server<R: UrlMappingRepository>(
    listen_addr: SocketAddr,
    base_url: Option<String>,
    allocator: Allocator<R, HashCodeGenerator>,
) -> anyhow::Result<()> {
    MetricsObserver::describe();
    let allocator = Arc::new(allocator.with_observer(Arc::new(MetricsObserver)));
    spawn_filter_warm_up(allocator.clone());

    let state = AppState::new(allocator, base_url);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "listening");

    axum::serve(listener, App::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}
