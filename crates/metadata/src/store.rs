//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{ImagePage, ImageRow, NewImage};
use crate::pool::{ConnectionPool, RetryPolicy};
use crate::repos::ImageRepo;
use async_trait::async_trait;
use picstash_core::PageRequest;
use picstash_core::config::PoolConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Connection, Sqlite};
use std::path::Path;
use std::time::Duration;
use time::OffsetDateTime;
use time::macros::format_description;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: ImageRepo + Send + Sync {
    /// Create the schema if it does not exist yet. Safe to run on every start.
    async fn ensure_schema(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Map an insert failure, turning a duplicate filename into `AlreadyExists`.
pub(crate) fn map_insert_error(err: sqlx::Error, filename: &str) -> MetadataError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return MetadataError::AlreadyExists(format!("filename '{filename}' already exists"));
    }
    MetadataError::Database(err)
}

pub(crate) fn to_sql_int(value: u64, what: &str) -> MetadataResult<i64> {
    i64::try_from(value).map_err(|_| MetadataError::Internal(format!("{what} {value} out of range")))
}

/// SQLite-based metadata store.
///
/// Runs on a single-connection pool: SQLite serializes writers anyway and a
/// single connection avoids "database is locked" failures under load.
pub struct SqliteStore {
    pool: ConnectionPool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and ensure the schema.
    pub async fn new(path: impl AsRef<Path>, pool_config: &PoolConfig) -> MetadataResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = ConnectionPool::initialize(
            SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(pool_config.acquire_timeout()),
            opts,
            RetryPolicy::from_config(pool_config),
        )
        .await?;

        let store = Self { pool };
        store.ensure_schema().await?;

        tracing::info!(path = %path.display(), "SQLite metadata store ready");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &ConnectionPool<Sqlite> {
        &self.pool
    }
}

/// Fixed-width UTC timestamp, so text ordering matches time ordering.
fn sqlite_timestamp(t: OffsetDateTime) -> MetadataResult<String> {
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
    );
    t.to_offset(time::UtcOffset::UTC)
        .format(&format)
        .map_err(|e| MetadataError::Internal(format!("failed to format timestamp: {e}")))
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn ensure_schema(&self) -> MetadataResult<()> {
        let mut conn = self.pool.acquire().await?;
        sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(SCHEMA_SQL)).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[async_trait]
impl ImageRepo for SqliteStore {
    async fn insert_image(&self, image: &NewImage) -> MetadataResult<ImageRow> {
        let upload_time = sqlite_timestamp(OffsetDateTime::now_utc())?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;
        let row = sqlx::query_as::<_, ImageRow>(
            "INSERT INTO images (filename, original_name, size, upload_time, file_type) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING id, filename, original_name, size, upload_time, file_type",
        )
        .bind(&image.filename)
        .bind(&image.original_name)
        .bind(image.size)
        .bind(upload_time)
        .bind(&image.file_type)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, &image.filename))?;
        tx.commit().await?;

        Ok(row)
    }

    async fn list_images(&self, page: PageRequest) -> MetadataResult<ImagePage> {
        let limit = to_sql_int(page.limit(), "limit")?;
        let offset = to_sql_int(page.offset(), "offset")?;

        let mut conn = self.pool.acquire().await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM images")
            .fetch_one(&mut *conn)
            .await?;
        let images = sqlx::query_as::<_, ImageRow>(
            "SELECT id, filename, original_name, size, upload_time, file_type FROM images \
             ORDER BY upload_time DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        Ok(ImagePage {
            images,
            total: total.max(0) as u64,
        })
    }

    async fn pick_random_image(&self) -> MetadataResult<Option<ImageRow>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, ImageRow>(
            "SELECT id, filename, original_name, size, upload_time, file_type FROM images \
             ORDER BY RANDOM() LIMIT 1",
        )
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row)
    }

    async fn delete_image(&self, id: i64) -> MetadataResult<Option<String>> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;
        let filename: Option<String> =
            sqlx::query_scalar("DELETE FROM images WHERE id = ? RETURNING filename")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        tx.commit().await?;
        Ok(filename)
    }

    async fn get_image(&self, id: i64) -> MetadataResult<Option<ImageRow>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, ImageRow>(
            "SELECT id, filename, original_name, size, upload_time, file_type FROM images \
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row)
    }

    async fn count_images(&self) -> MetadataResult<u64> {
        let mut conn = self.pool.acquire().await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM images")
            .fetch_one(&mut *conn)
            .await?;
        Ok(total.max(0) as u64)
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL UNIQUE,
    original_name TEXT NOT NULL,
    size INTEGER NOT NULL CHECK (size > 0),
    upload_time TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    file_type TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_images_upload_time ON images (upload_time DESC);
"#;
