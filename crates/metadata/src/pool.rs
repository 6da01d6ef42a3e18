//! Connection pool lifecycle with bounded retry.
//!
//! The database is usually started next to the service and may refuse
//! connections for a while. Pool construction and per-request acquisition
//! retry transient failures on a fixed schedule; anything else fails at once.
//!
//! Connections are returned to the pool when the [`PoolConnection`] guard is
//! dropped, so every exit path (success, `?`, panic, cancelled future)
//! releases them.

use crate::error::{MetadataError, MetadataResult};
use picstash_core::config::PoolConfig;
use sqlx::pool::{PoolConnection, PoolOptions};
use sqlx::{Connection, Database, Pool};
use std::future::Future;
use std::time::Duration;

/// Fixed-delay retry schedule for transient connectivity failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(config.connect_attempts, config.retry_delay())
    }

    /// Run `f` until it succeeds, fails with a non-transient error, or the
    /// attempts are used up.
    ///
    /// Exhaustion is reported as [`MetadataError::Unavailable`] carrying the
    /// last error.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut f: F) -> MetadataResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let mut attempt = 1;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation, attempt, "Database reachable after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !is_transient(&e) => return Err(e.into()),
                Err(e) if attempt >= self.max_attempts => {
                    tracing::error!(
                        operation,
                        attempts = attempt,
                        error = %e,
                        "Database still unavailable, giving up"
                    );
                    return Err(MetadataError::Unavailable {
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        retry_in_ms = self.delay.as_millis() as u64,
                        error = %e,
                        "Database not ready, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&PoolConfig::default())
    }
}

/// Whether an error means "the database is not reachable yet" rather than
/// "the request is wrong".
///
/// Transient: socket and TLS failures, pool acquisition timeouts, PostgreSQL
/// `57P03` (cannot connect now) and `53300` (too many connections), and
/// SQLite `SQLITE_BUSY`.
pub fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db_err) => {
            matches!(db_err.code().as_deref(), Some("57P03" | "53300" | "5"))
        }
        _ => false,
    }
}

/// A bounded pool of connections to one database.
pub struct ConnectionPool<DB: Database> {
    pool: Pool<DB>,
    retry: RetryPolicy,
}

impl<DB: Database> ConnectionPool<DB> {
    /// Build the pool, retrying while the database refuses connections.
    ///
    /// `options` carries the pool bounds; at least one connection is opened
    /// before this returns.
    pub async fn initialize(
        options: PoolOptions<DB>,
        connect: <DB::Connection as Connection>::Options,
        retry: RetryPolicy,
    ) -> MetadataResult<Self> {
        let pool = retry
            .run("connect", || options.clone().connect_with(connect.clone()))
            .await?;
        Ok(Self { pool, retry })
    }

    /// Check out one connection, retrying on the same schedule as
    /// [`initialize`](Self::initialize).
    ///
    /// The connection goes back to the pool when the guard is dropped.
    pub async fn acquire(&self) -> MetadataResult<PoolConnection<DB>> {
        self.retry.run("acquire", || self.pool.acquire()).await
    }

    /// Get a reference to the underlying sqlx pool.
    pub fn inner(&self) -> &Pool<DB> {
        &self.pool
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Number of connections currently idle in the pool.
    pub fn num_idle(&self) -> usize {
        self.pool.num_idle()
    }
}
