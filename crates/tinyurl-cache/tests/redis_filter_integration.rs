use redis::AsyncCommands;
use std::time::{Duration, Instant};
use tinyurl_cache::{BloomFilterConfig, RedisExistenceFilter};
use tinyurl_core::{
    CacheError, ExistenceFilter, NormalizedUrl, ShortCode, UrlMapping, UrlMappingRepository,
};
use tinyurl_storage::InMemoryRepository;
use tinyurl_test_infra::redis::RedisMaster;

fn small_config() -> BloomFilterConfig {
    BloomFilterConfig::builder()
        .expected_items(10_000)
        .false_positive_rate(0.001)
        .page_size(50)
        .build()
}

fn code(i: usize) -> ShortCode {
    ShortCode::new_unchecked(format!("r{i:08}"))
}

async fn seeded_repository(n: usize) -> InMemoryRepository {
    let repository = InMemoryRepository::new();
    for i in 0..n {
        let url = NormalizedUrl::parse(&format!("example.com/{i}")).unwrap();
        repository.save(&UrlMapping::new(code(i), url)).await.unwrap();
    }
    repository
}

#[tokio::test]
async fn test_redis_filter_add_and_check() {
    let redis = RedisMaster::new().await.expect("Failed to start Redis master");
    let conn = redis.connection().await.unwrap();
    let filter = RedisExistenceFilter::new(conn, small_config()).unwrap();

    assert!(filter.definitely_not_exist(&code(1)).await);
    filter.add(&code(1)).await.unwrap();
    assert!(!filter.definitely_not_exist(&code(1)).await);

    let batch: Vec<_> = (2..200).map(code).collect();
    filter.add_batch(&batch).await.unwrap();
    for c in &batch {
        assert!(!filter.definitely_not_exist(c).await);
    }
}

#[tokio::test]
async fn test_redis_filter_initialize_loads_store_and_marks_ready() {
    let redis = RedisMaster::new().await.expect("Failed to start Redis master");
    let mut conn = redis.connection().await.unwrap();
    let repository = seeded_repository(120).await;

    let filter = RedisExistenceFilter::with_name(conn.clone(), "test:filter", small_config())
        .unwrap();
    assert!(!filter.is_warm());
    filter.initialize(&repository).await.unwrap();
    assert!(filter.is_warm());

    for i in 0..120 {
        assert!(!filter.definitely_not_exist(&code(i)).await);
    }

    let ready: Option<String> = conn.hget("test:filter:config", "ready").await.unwrap();
    assert_eq!(ready.as_deref(), Some("1"));
}

#[tokio::test]
async fn test_redis_filter_is_shared_between_handles() {
    let redis = RedisMaster::new().await.expect("Failed to start Redis master");
    let repository = seeded_repository(10).await;

    let first = RedisExistenceFilter::new(redis.connection().await.unwrap(), small_config())
        .unwrap();
    first.initialize(&repository).await.unwrap();
    first.add(&code(500)).await.unwrap();

    // A second process sees the ready flag and skips its own load.
    let second = RedisExistenceFilter::new(redis.connection().await.unwrap(), small_config())
        .unwrap();
    second.initialize(&InMemoryRepository::new()).await.unwrap();
    assert!(second.is_warm());
    assert!(!second.definitely_not_exist(&code(3)).await);
    assert!(!second.definitely_not_exist(&code(500)).await);
}

#[tokio::test]
async fn test_redis_filter_adopts_registered_geometry() {
    let redis = RedisMaster::new().await.expect("Failed to start Redis master");
    let repository = seeded_repository(20).await;

    let registered = RedisExistenceFilter::new(redis.connection().await.unwrap(), small_config())
        .unwrap();
    registered.initialize(&repository).await.unwrap();

    let bigger = BloomFilterConfig::builder().expected_items(1_000_000).build();
    let resized = RedisExistenceFilter::new(redis.connection().await.unwrap(), bigger).unwrap();
    assert_ne!(resized.geometry(), registered.geometry());

    // Codes published before the resized handle warms up still land on the
    // registered bit positions.
    let published: Vec<_> = (1_000..2_000).map(code).collect();
    for c in &published[..10] {
        resized.add(c).await.unwrap();
    }
    resized.add_batch(&published[10..]).await.unwrap();
    assert_eq!(resized.geometry(), registered.geometry());

    for c in &published {
        assert!(!registered.definitely_not_exist(c).await, "{c} reported absent");
    }

    resized.initialize(&InMemoryRepository::new()).await.unwrap();
    assert!(resized.is_warm());
    assert!(!resized.definitely_not_exist(&code(7)).await);
}

#[tokio::test]
async fn test_redis_filter_rejects_corrupt_config() {
    let redis = RedisMaster::new().await.expect("Failed to start Redis master");
    let mut conn = redis.connection().await.unwrap();
    let _: () = conn.hset("broken:filter:config", "bits", 0).await.unwrap();
    let _: () = conn.hset("broken:filter:config", "hashes", 7).await.unwrap();

    let filter = RedisExistenceFilter::with_name(conn.clone(), "broken:filter", small_config())
        .unwrap();
    let result = filter.initialize(&InMemoryRepository::new()).await;

    assert!(matches!(result, Err(CacheError::InvalidData(_))));
    assert!(!filter.is_warm());
    // Without a usable geometry nothing is ever reported absent.
    assert!(!filter.definitely_not_exist(&code(1)).await);
    assert!(filter.add(&code(1)).await.is_err());
}

#[tokio::test]
async fn test_redis_filter_calls_are_bounded() {
    let redis = RedisMaster::new().await.expect("Failed to start Redis master");
    let filter = RedisExistenceFilter::new(redis.connection().await.unwrap(), small_config())
        .unwrap()
        .timeout(Duration::from_millis(100));
    filter.initialize(&InMemoryRepository::new()).await.unwrap();
    assert!(filter.definitely_not_exist(&code(42)).await);

    let mut admin = redis.connection().await.unwrap();
    let () = redis::cmd("CLIENT")
        .arg("PAUSE")
        .arg(2_000)
        .query_async(&mut admin)
        .await
        .unwrap();

    let started = Instant::now();
    // A stalled lookup answers "may exist" instead of "absent".
    assert!(!filter.definitely_not_exist(&code(42)).await);
    assert!(matches!(filter.add(&code(42)).await, Err(CacheError::Timeout(_))));
    assert!(started.elapsed() < Duration::from_millis(1_500));
}
