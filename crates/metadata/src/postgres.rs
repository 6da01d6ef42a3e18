//! PostgreSQL-based metadata store implementation.

use crate::error::MetadataResult;
use crate::models::{ImagePage, ImageRow, NewImage};
use crate::pool::{ConnectionPool, RetryPolicy};
use crate::repos::ImageRepo;
use crate::store::{MetadataStore, map_insert_error, to_sql_int};
use async_trait::async_trait;
use picstash_core::PageRequest;
use picstash_core::config::{PgSslMode, PoolConfig};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Connection, Postgres};
use std::str::FromStr;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: ConnectionPool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        pool_config: &PoolConfig,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        tracing::info!("Connecting to PostgreSQL using connection URL");
        Self::connect(opts, pool_config, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    ///
    /// This allows credentials to be passed separately, enabling better
    /// secret management (e.g., passwords via environment variables).
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        pool_config: &PoolConfig,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, pool_config, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        pool_config: &PoolConfig,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{timeout_ms}ms"))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = ConnectionPool::initialize(
            PgPoolOptions::new()
                .min_connections(pool_config.min_connections)
                .max_connections(pool_config.max_connections)
                .acquire_timeout(pool_config.acquire_timeout()),
            opts,
            RetryPolicy::from_config(pool_config),
        )
        .await?;

        let store = Self { pool };
        store.ensure_schema().await?;

        tracing::info!(
            min_connections = pool_config.min_connections,
            max_connections = pool_config.max_connections,
            "PostgreSQL metadata store ready"
        );
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &ConnectionPool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn ensure_schema(&self) -> MetadataResult<()> {
        let mut conn = self.pool.acquire().await?;
        // PostgreSQL doesn't allow multiple statements in a single prepared statement,
        // so we split the schema and execute each statement separately.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&mut *conn).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl ImageRepo for PostgresStore {
    async fn insert_image(&self, image: &NewImage) -> MetadataResult<ImageRow> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;
        let row = sqlx::query_as::<_, ImageRow>(
            r#"
            INSERT INTO images (filename, original_name, size, file_type)
            VALUES ($1, $2, $3, $4)
            RETURNING id, filename, original_name, size, upload_time, file_type
            "#,
        )
        .bind(&image.filename)
        .bind(&image.original_name)
        .bind(image.size)
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
            r#"
            SELECT id, filename, original_name, size, upload_time, file_type
            FROM images
            ORDER BY upload_time DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
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
            r#"
            SELECT id, filename, original_name, size, upload_time, file_type
            FROM images
            ORDER BY RANDOM()
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row)
    }

    async fn delete_image(&self, id: i64) -> MetadataResult<Option<String>> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;
        let filename: Option<String> =
            sqlx::query_scalar("DELETE FROM images WHERE id = $1 RETURNING filename")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        tx.commit().await?;
        Ok(filename)
    }

    async fn get_image(&self, id: i64) -> MetadataResult<Option<ImageRow>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, ImageRow>(
            r#"
            SELECT id, filename, original_name, size, upload_time, file_type
            FROM images
            WHERE id = $1
            "#,
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
