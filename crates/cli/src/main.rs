//! Operator CLI for picstash.

mod backup;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use picstash_core::config::{AppConfig, MetadataConfig};
use picstash_core::format_size;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "picstashctl")]
#[command(about = "Operator CLI for picstash")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ConfigArgs {
    /// Server configuration file (same file picstashd reads)
    #[arg(
        short,
        long,
        global = true,
        env = "PICSTASH_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,

    /// Backup directory (overrides backup.dir)
    #[arg(long, global = true)]
    backup_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Database backup commands
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
}

#[derive(Subcommand)]
enum BackupCommands {
    /// Dump the database into a new timestamped file
    Create {
        /// pg_dump executable
        #[arg(long, env = "PICSTASH_PG_DUMP", default_value = "pg_dump")]
        pg_dump: String,
    },
    /// Restore the database from a backup file
    Restore {
        /// Backup file name inside the backup directory
        file: String,
        /// psql executable
        #[arg(long, env = "PICSTASH_PSQL", default_value = "psql")]
        psql: String,
    },
    /// List backup files, newest first
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cli { config, command } = Cli::parse();
    let app_config = load_config(&config.config)?;
    let backup_dir = config
        .backup_dir
        .unwrap_or_else(|| app_config.backup.dir.clone());

    match command {
        Commands::Backup { command } => {
            handle_backup_command(command, &app_config, &backup_dir).await
        }
    }
}

/// Load configuration the same way the server does.
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
        config.metadata = MetadataConfig::postgres_url(url.trim());
    }

    Ok(config)
}

/// Connection URL for pg_dump/psql; SQLite has nothing to dump this way.
fn database_url(config: &AppConfig) -> Result<String> {
    match &config.metadata {
        MetadataConfig::Sqlite { path } => bail!(
            "backups require PostgreSQL metadata, but the configured store is SQLite at {}\n\
             Set DATABASE_URL or [metadata] type = \"postgres\".",
            path.display()
        ),
        postgres => postgres
            .connection_url()
            .context("postgres config requires either 'url' or 'host' + 'database'"),
    }
}

async fn handle_backup_command(
    command: BackupCommands,
    config: &AppConfig,
    dir: &std::path::Path,
) -> Result<()> {
    match command {
        BackupCommands::Create { pg_dump } => {
            let url = database_url(config)?;
            println!("Creating backup...");
            let backup = backup::create_backup(&pg_dump, &url, dir).await?;
            println!(
                "Backup created: {} ({})",
                backup.name,
                format_size(backup.size)
            );
        }
        BackupCommands::Restore { file, psql } => {
            backup::resolve_backup(dir, &file)?;
            let url = database_url(config)?;
            backup::restore_backup(&psql, &url, dir, &file).await?;
            println!("Restore complete: {file}");
        }
        BackupCommands::List => {
            let backups = backup::list_backups(dir).await?;
            if backups.is_empty() {
                println!("No backups in {}", dir.display());
                return Ok(());
            }
            for backup in backups {
                println!("{:<32} {:>12}", backup.name, format_size(backup.size));
            }
        }
    }
    Ok(())
}
