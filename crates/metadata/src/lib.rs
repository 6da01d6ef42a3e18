//! Metadata store abstraction and implementations for picstash.
//!
//! This crate owns everything that talks to the relational database:
//! - The connection pool and its bounded startup/acquire retry
//! - Schema bootstrap
//! - Image record insert, paginated listing, random pick and delete

pub mod error;
pub mod models;
pub mod pool;
pub mod postgres;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use models::{ImagePage, ImageRow, NewImage};
pub use pool::{ConnectionPool, RetryPolicy, is_transient};
pub use postgres::PostgresStore;
pub use repos::ImageRepo;
pub use store::{MetadataStore, SqliteStore};

pub use sqlx;

use picstash_core::config::{MetadataConfig, PoolConfig};
use std::sync::Arc;

/// Create a metadata store from configuration.
///
/// Retries while the database is unreachable and fails with
/// [`MetadataError::Unavailable`] once the configured attempts run out.
pub async fn from_config(
    config: &MetadataConfig,
    pool: &PoolConfig,
) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite { path } => {
            let store = SqliteStore::new(path, pool).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
        MetadataConfig::Postgres {
            url,
            host,
            port,
            username,
            password,
            database,
            ssl_mode,
            statement_timeout_ms,
        } => {
            let store = if let Some(url) = url {
                PostgresStore::from_url(url, pool, *statement_timeout_ms).await?
            } else if let (Some(host), Some(database)) = (host.as_ref(), database.as_ref()) {
                PostgresStore::from_params(
                    host,
                    port.unwrap_or(5432),
                    username.as_deref(),
                    password.as_deref(),
                    database,
                    *ssl_mode,
                    pool,
                    *statement_timeout_ms,
                )
                .await?
            } else {
                return Err(MetadataError::Config(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ));
            };
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
