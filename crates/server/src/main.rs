//! picstash server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use picstash_core::config::{AppConfig, MetadataConfig};
use picstash_server::{AppState, create_router};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// picstash - a small image hosting server
#[derive(Parser, Debug)]
#[command(name = "picstashd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "PICSTASH_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

/// Load configuration: optional TOML file, then `PICSTASH_*` env vars,
/// then `DATABASE_URL`.
fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if std::path::Path::new(path).exists() {
        figment = figment.merge(Toml::file(path));
    }

    let mut config: AppConfig = figment
        .merge(Env::prefixed("PICSTASH_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    if let Ok(url) = std::env::var("DATABASE_URL")
        && !url.trim().is_empty()
    {
        apply_database_url(&mut config, url.trim());
    }

    Ok(config)
}

/// Point metadata at a PostgreSQL URL, keeping a configured statement timeout.
fn apply_database_url(config: &mut AppConfig, url: &str) {
    let statement_timeout = match &config.metadata {
        MetadataConfig::Postgres {
            statement_timeout_ms,
            ..
        } => *statement_timeout_ms,
        MetadataConfig::Sqlite { .. } => None,
    };

    config.metadata = MetadataConfig::postgres_url(url);
    if let MetadataConfig::Postgres {
        statement_timeout_ms,
        ..
    } = &mut config.metadata
    {
        *statement_timeout_ms = statement_timeout;
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args.config)?;

    let default_filter = if config.server.debug {
        "debug,tower_http=debug"
    } else {
        "info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("picstash v{}", env!("CARGO_PKG_VERSION"));
    if std::path::Path::new(&args.config).exists() {
        tracing::info!(config_path = %args.config, "Loaded configuration file");
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    picstash_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let storage = picstash_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(
        upload_dir = %config.storage.upload_dir.display(),
        "Image storage ready"
    );

    // Exhausting the connect attempts here is fatal.
    let metadata = picstash_metadata::from_config(&config.metadata, &config.pool)
        .await
        .context("failed to initialize metadata store")?;
    tracing::info!(backend = metadata.backend_name(), "Metadata store initialized");

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    let state = AppState::new(config, storage, metadata);
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_url_selects_postgres() {
        let mut config = AppConfig::default();
        apply_database_url(&mut config, "postgresql://u:p@db:5432/images");

        assert_eq!(
            config.metadata.connection_url().as_deref(),
            Some("postgresql://u:p@db:5432/images")
        );
        config.validate().unwrap();
    }

    #[test]
    fn database_url_keeps_statement_timeout() {
        let mut config = AppConfig::default();
        config.metadata = MetadataConfig::Postgres {
            url: None,
            host: Some("localhost".to_string()),
            port: Some(5432),
            username: None,
            password: None,
            database: Some("images".to_string()),
            ssl_mode: None,
            statement_timeout_ms: Some(1500),
        };

        apply_database_url(&mut config, "postgresql://db/images");

        let MetadataConfig::Postgres {
            url,
            statement_timeout_ms,
            ..
        } = &config.metadata
        else {
            panic!("expected postgres config");
        };
        assert_eq!(url.as_deref(), Some("postgresql://db/images"));
        assert_eq!(*statement_timeout_ms, Some(1500));
    }

    #[test]
    fn load_config_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(
            &path,
            r#"
[server]
bind = "127.0.0.1:9000"

[pagination]
default_per_page = 20
min_per_page = 5
max_per_page = 40

[metadata]
type = "sqlite"
path = "/tmp/picstash-test.db"
"#,
        )
        .unwrap();

        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(config.pagination.default_per_page, 20);
        assert_eq!(config.pagination.max_per_page, 40);
    }

    #[test]
    fn load_config_without_file_uses_defaults() {
        let config = load_config("/nonexistent/picstash.toml").unwrap();
        assert_eq!(config.uploads.max_upload_bytes, 5 * 1024 * 1024);
    }
}
