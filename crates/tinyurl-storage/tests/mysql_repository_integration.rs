use std::time::Duration;

use sqlx::mysql::MySqlPoolOptions;
use tinyurl_core::{
    scan_short_codes, NormalizedUrl, ShortCode, StorageError, UrlMapping, UrlMappingRepository,
};
use tinyurl_storage::MySqlRepository;
use tinyurl_test_infra::mysql::MySqlServer;

struct Fixture {
    _mysql: MySqlServer,
    repo: MySqlRepository,
}

impl Fixture {
    async fn start() -> Self {
        let mysql = MySqlServer::start().await.expect("start mysql");
        let url = mysql.database_url().await.expect("mysql url");
        let pool = connect_with_retry(&url).await;

        let repo = MySqlRepository::new(pool);
        repo.ensure_schema().await.expect("create schema");

        Self {
            _mysql: mysql,
            repo,
        }
    }
}

async fn connect_with_retry(url: &str) -> sqlx::MySqlPool {
    let mut last_error = None;

    for _ in 0..20 {
        match MySqlPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
        {
            Ok(pool) => return pool,
            Err(err) => {
                last_error = Some(err);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    panic!("failed to connect mysql: {last_error:?}");
}

fn mapping(code: &str, url: &str) -> UrlMapping {
    UrlMapping::new(
        ShortCode::new_unchecked(code),
        NormalizedUrl::parse(url).unwrap(),
    )
}

#[tokio::test]
async fn save_and_find_by_either_key() {
    let fixture = Fixture::start().await;
    let m = mapping("abc123", "https://example.com/a?b=c d");

    fixture.repo.save(&m).await.unwrap();

    let by_code = fixture
        .repo
        .find_by_short_code(&m.short_code)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_code.long_url, m.long_url);
    assert_eq!(by_code.created_at.as_second(), m.created_at.as_second());

    let by_long = fixture
        .repo
        .find_by_long_url(&m.long_url)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_long.short_code, m.short_code);

    assert!(fixture.repo.exists_by_short_code(&m.short_code).await.unwrap());
}

#[tokio::test]
async fn missing_rows_are_none() {
    let fixture = Fixture::start().await;

    let code = ShortCode::new_unchecked("nothing");
    assert!(fixture.repo.find_by_short_code(&code).await.unwrap().is_none());
    assert!(!fixture.repo.exists_by_short_code(&code).await.unwrap());
    assert!(fixture
        .repo
        .find_by_long_url(&NormalizedUrl::parse("example.com/none").unwrap())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn save_conflicts_on_duplicate_short_code() {
    let fixture = Fixture::start().await;
    fixture
        .repo
        .save(&mapping("abc123", "one.example"))
        .await
        .unwrap();

    let err = fixture
        .repo
        .save(&mapping("abc123", "two.example"))
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Conflict(_)));
}

#[tokio::test]
async fn save_conflicts_on_duplicate_long_url() {
    let fixture = Fixture::start().await;
    fixture
        .repo
        .save(&mapping("abc123", "one.example"))
        .await
        .unwrap();

    let err = fixture
        .repo
        .save(&mapping("def456", "one.example"))
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Conflict(_)));
}

#[tokio::test]
async fn short_codes_are_case_sensitive() {
    let fixture = Fixture::start().await;
    fixture.repo.save(&mapping("AbC", "upper.example")).await.unwrap();
    fixture.repo.save(&mapping("abc", "lower.example")).await.unwrap();

    let upper = fixture
        .repo
        .find_by_short_code(&ShortCode::new_unchecked("AbC"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(upper.long_url.as_str(), "upper.example");
}

#[tokio::test]
async fn scan_pages_through_every_code() {
    let fixture = Fixture::start().await;
    for i in 0..25 {
        fixture
            .repo
            .save(&mapping(&format!("c{i:03}"), &format!("example.com/{i}")))
            .await
            .unwrap();
    }

    let mut pages = scan_short_codes(&fixture.repo, 10);
    let mut seen = Vec::new();
    while let Some(page) = pages.next_page().await.unwrap() {
        assert!(page.len() <= 10);
        seen.extend(page);
    }

    assert_eq!(seen.len(), 25);
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
}
