//! Configuration types shared across crates.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Verbose logging (`debug` level instead of `info`).
    #[serde(default)]
    pub debug: bool,
    /// Optional absolute prefix for image URLs in API responses
    /// (e.g., "https://img.example.com"). Relative URLs are returned when unset.
    #[serde(default)]
    pub public_base_url: Option<String>,
    /// Upper bound for handling a single request, including pool acquisition
    /// and disk I/O. Expired requests are answered with 503.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Attach a permissive CORS layer (default: true).
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            debug: false,
            public_base_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            cors_enabled: true,
            metrics_enabled: true,
        }
    }
}

impl ServerConfig {
    /// Get the request timeout as a Duration.
    ///
    /// A zero value is treated as one second so that a misconfiguration cannot
    /// turn every request into an immediate timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Upload acceptance rules.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum accepted file size in bytes (default: 5 MiB).
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Allowed file extensions, compared case-insensitively, without the leading dot.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Allowed declared MIME types, compared case-insensitively.
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
}

fn default_max_upload_bytes() -> u64 {
    crate::DEFAULT_MAX_UPLOAD_BYTES
}

fn default_allowed_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_allowed_mime_types() -> Vec<String> {
    ["image/jpeg", "image/png", "image/gif"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            allowed_extensions: default_allowed_extensions(),
            allowed_mime_types: default_allowed_mime_types(),
        }
    }
}

impl UploadConfig {
    /// Validate upload configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_upload_bytes == 0 {
            return Err("uploads.max_upload_bytes must be greater than 0".to_string());
        }
        if usize::try_from(self.max_upload_bytes).is_err() {
            return Err(format!(
                "uploads.max_upload_bytes {} exceeds platform address space",
                self.max_upload_bytes
            ));
        }
        if self.allowed_extensions.is_empty() {
            return Err("uploads.allowed_extensions cannot be empty".to_string());
        }
        if self.allowed_mime_types.is_empty() {
            return Err("uploads.allowed_mime_types cannot be empty".to_string());
        }
        Ok(())
    }

    /// Check whether an extension (without the dot) is on the allow-list.
    pub fn extension_allowed(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }

    /// Check whether a declared content type is on the allow-list.
    ///
    /// Parameters such as `; charset=...` are ignored.
    pub fn mime_allowed(&self, content_type: &str) -> bool {
        let essence = content_type.split(';').next().unwrap_or("").trim();
        self.allowed_mime_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(essence))
    }
}

/// Pagination bounds for image listings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Page size used when the client does not send `per_page`.
    #[serde(default = "default_per_page")]
    pub default_per_page: u32,
    /// Smallest page size a client can obtain.
    #[serde(default = "default_min_per_page")]
    pub min_per_page: u32,
    /// Largest page size a client can obtain.
    #[serde(default = "default_max_per_page")]
    pub max_per_page: u32,
}

fn default_per_page() -> u32 {
    10
}

fn default_min_per_page() -> u32 {
    10
}

fn default_max_per_page() -> u32 {
    50
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_per_page: default_per_page(),
            min_per_page: default_min_per_page(),
            max_per_page: default_max_per_page(),
        }
    }
}

impl PaginationConfig {
    /// Validate pagination bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_per_page == 0 {
            return Err("pagination.min_per_page must be at least 1".to_string());
        }
        if self.min_per_page > self.max_per_page {
            return Err(format!(
                "pagination.min_per_page ({}) exceeds pagination.max_per_page ({})",
                self.min_per_page, self.max_per_page
            ));
        }
        if !(self.min_per_page..=self.max_per_page).contains(&self.default_per_page) {
            return Err(format!(
                "pagination.default_per_page ({}) must be within [{}, {}]",
                self.default_per_page, self.min_per_page, self.max_per_page
            ));
        }
        Ok(())
    }
}

/// Image file storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding uploaded image files.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./images")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
        }
    }
}

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

impl PgSslMode {
    /// Value of the `sslmode` connection-string parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Prefer => "prefer",
            Self::Require => "require",
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database (development and single-host deployments).
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL (optional if using individual fields).
        /// Takes precedence over individual fields if both are provided.
        url: Option<String>,
        /// Database host (e.g., "localhost" or "postgres").
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password.
        /// WARNING: Prefer PICSTASH_METADATA__PASSWORD env var over storing in config.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
        /// SSL mode for connections.
        ssl_mode: Option<PgSslMode>,
        /// Statement timeout in milliseconds (prevents hung queries).
        #[serde(default)]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
        }
    }
}

impl MetadataConfig {
    /// PostgreSQL configuration from a bare connection URL.
    pub fn postgres_url(url: impl Into<String>) -> Self {
        Self::Postgres {
            url: Some(url.into()),
            host: None,
            port: default_pg_port(),
            username: None,
            password: None,
            database: None,
            ssl_mode: None,
            statement_timeout_ms: None,
        }
    }

    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { .. } => Ok(()),
            MetadataConfig::Postgres {
                url,
                host,
                database,
                ..
            } => match (url.as_ref(), host.as_ref(), database.as_ref()) {
                (Some(_), _, _) => Ok(()),
                (None, Some(_), Some(_)) => Ok(()),
                (None, None, _) => Err(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ),
                (None, Some(_), None) => Err(
                    "postgres config requires 'database' when using individual fields"
                        .to_string(),
                ),
            },
        }
    }

    /// Build a libpq-compatible connection URL for external tools (pg_dump, psql).
    ///
    /// Returns `None` for SQLite or when the PostgreSQL config is incomplete.
    pub fn connection_url(&self) -> Option<String> {
        match self {
            MetadataConfig::Sqlite { .. } => None,
            MetadataConfig::Postgres {
                url: Some(url), ..
            } => Some(url.clone()),
            MetadataConfig::Postgres {
                url: None,
                host: Some(host),
                port,
                username,
                password,
                database: Some(database),
                ssl_mode,
                ..
            } => {
                let credentials = match (username, password) {
                    (Some(user), Some(pass)) => {
                        format!("{}:{}@", url_component(user), url_component(pass))
                    }
                    (Some(user), None) => format!("{}@", url_component(user)),
                    _ => String::new(),
                };
                let mut url = format!(
                    "postgresql://{credentials}{host}:{}/{}",
                    port.unwrap_or(5432),
                    url_component(database)
                );
                if let Some(mode) = ssl_mode {
                    url.push_str("?sslmode=");
                    url.push_str(mode.as_str());
                }
                Some(url)
            }
            MetadataConfig::Postgres { .. } => None,
        }
    }
}

/// Everything except RFC 3986 unreserved characters.
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn url_component(value: &str) -> String {
    utf8_percent_encode(value, URL_COMPONENT).to_string()
}

/// Connection pool sizing and retry policy.
///
/// The database is frequently started alongside the service and may take a
/// while to accept connections, so pool construction and connection
/// acquisition retry transient failures with a fixed delay.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Connections kept open when idle.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Upper bound on open connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Attempts before giving up on a transient failure (default: 60).
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    /// Fixed delay between attempts in milliseconds (default: 2000).
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// How long a single acquisition waits for a free connection.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_min_connections() -> u32 {
    1
}

fn default_max_connections() -> u32 {
    10
}

fn default_connect_attempts() -> u32 {
    60
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            connect_attempts: default_connect_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

impl PoolConfig {
    /// Validate pool sizing.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("pool.max_connections must be at least 1".to_string());
        }
        if self.min_connections > self.max_connections {
            return Err(format!(
                "pool.min_connections ({}) exceeds pool.max_connections ({})",
                self.min_connections, self.max_connections
            ));
        }
        if self.connect_attempts == 0 {
            return Err("pool.connect_attempts must be at least 1".to_string());
        }
        Ok(())
    }

    /// Delay between retry attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Per-acquisition wait.
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs.max(1))
    }
}

/// Database backup configuration (used by `picstashctl`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Directory holding timestamped dump files.
    #[serde(default = "default_backup_dir")]
    pub dir: PathBuf,
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("./backup")
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Upload acceptance rules.
    #[serde(default)]
    pub uploads: UploadConfig,
    /// Listing page-size bounds.
    #[serde(default)]
    pub pagination: PaginationConfig,
    /// Image file storage.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Connection pool configuration.
    #[serde(default)]
    pub pool: PoolConfig,
    /// Backup configuration.
    #[serde(default)]
    pub backup: BackupConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses SQLite metadata and a short retry delay so
    /// tests never sit through the production connect schedule.
    pub fn for_testing() -> Self {
        Self {
            pool: PoolConfig {
                connect_attempts: 3,
                retry_delay_ms: 10,
                ..PoolConfig::default()
            },
            ..Self::default()
        }
    }

    /// Validate every section, returning the first error found.
    pub fn validate(&self) -> Result<(), String> {
        self.uploads.validate()?;
        self.pagination.validate()?;
        self.metadata.validate()?;
        self.pool.validate()?;
        Ok(())
    }
}
