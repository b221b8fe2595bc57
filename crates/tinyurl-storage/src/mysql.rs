use async_trait::async_trait;
use jiff::Timestamp;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use tinyurl_core::repository::{Result, UrlMapping, UrlMappingRepository};
use tinyurl_core::{NormalizedUrl, ShortCode, StorageError};
use tracing::debug;

/// MySQL implementation of the repository contract.
///
/// Rows live in `url_mappings` (see [`MYSQL_SCHEMA`](crate::MYSQL_SCHEMA)).
/// `short_code` is the primary key and `long_url` carries its own unique
/// index, so concurrent inserts of either value are settled by the database.
#[derive(Debug, Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    /// Creates a repository from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Creates the `url_mappings` table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(crate::MYSQL_SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

fn parse_created_at(seconds: i64) -> Result<Timestamp> {
    Timestamp::from_second(seconds).map_err(|e| {
        StorageError::InvalidData(format!("invalid created_at timestamp '{}': {e}", seconds))
    })
}

fn row_to_mapping(row: &MySqlRow) -> Result<UrlMapping> {
    let short_code: String = row.try_get("short_code").map_err(map_sqlx_error)?;
    let long_url: String = row.try_get("long_url").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;

    Ok(UrlMapping {
        short_code: ShortCode::new_unchecked(short_code),
        long_url: NormalizedUrl::from_normalized(long_url),
        created_at: parse_created_at(created_at)?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl UrlMappingRepository for MySqlRepository {
    async fn exists_by_short_code(&self, code: &ShortCode) -> Result<bool> {
        let exists = sqlx::query(
            r#"
            SELECT 1
            FROM url_mappings
            WHERE short_code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .is_some();

        Ok(exists)
    }

    async fn find_by_short_code(&self, code: &ShortCode) -> Result<Option<UrlMapping>> {
        let row = sqlx::query(
            r#"
            SELECT short_code, long_url, created_at
            FROM url_mappings
            WHERE short_code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(row_to_mapping).transpose()
    }

    async fn find_by_long_url(&self, url: &NormalizedUrl) -> Result<Option<UrlMapping>> {
        let row = sqlx::query(
            r#"
            SELECT short_code, long_url, created_at
            FROM url_mappings
            WHERE long_url = ?
            LIMIT 1
            "#,
        )
        .bind(url.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(row_to_mapping).transpose()
    }

    async fn save(&self, mapping: &UrlMapping) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO url_mappings (short_code, long_url, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(mapping.short_code.as_str())
        .bind(mapping.long_url.as_str())
        .bind(mapping.created_at.as_second())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(code = %mapping.short_code, "Inserted url mapping");
                Ok(())
            }
            Err(err) if is_unique_violation(&err) => Err(StorageError::Conflict(format!(
                "{} or {} already exists",
                mapping.short_code, mapping.long_url
            ))),
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn short_code_page(
        &self,
        after: Option<&ShortCode>,
        limit: usize,
    ) -> Result<Vec<ShortCode>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let query = match after {
            Some(after) => sqlx::query(
                r#"
                SELECT short_code
                FROM url_mappings
                WHERE short_code > ?
                ORDER BY short_code
                LIMIT ?
                "#,
            )
            .bind(after.as_str())
            .bind(limit),
            None => sqlx::query(
                r#"
                SELECT short_code
                FROM url_mappings
                ORDER BY short_code
                LIMIT ?
                "#,
            )
            .bind(limit),
        };

        let rows = query.fetch_all(&self.pool).await.map_err(map_sqlx_error)?;
        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("short_code")
                    .map(ShortCode::new_unchecked)
                    .map_err(map_sqlx_error)
            })
            .collect()
    }
}
