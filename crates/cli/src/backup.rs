//! PostgreSQL dump and restore through `pg_dump` and `psql`.
//!
//! Dumps are plain SQL files named `backup_<YYYY-MM-DD_HHMMSS>.sql` in a
//! single backup directory. Restores only accept a bare file name from that
//! directory.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use time::OffsetDateTime;
use time::macros::format_description;
use tokio::process::Command;

const BACKUP_PREFIX: &str = "backup_";
const BACKUP_SUFFIX: &str = ".sql";

/// A dump file in the backup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub name: String,
    pub size: u64,
}

/// File name for a dump taken at `at` (UTC in practice).
pub fn backup_file_name(at: OffsetDateTime) -> Result<String> {
    let stamp = at
        .format(format_description!(
            "[year]-[month]-[day]_[hour][minute][second]"
        ))
        .context("failed to format backup timestamp")?;
    Ok(format!("{BACKUP_PREFIX}{stamp}{BACKUP_SUFFIX}"))
}

/// Resolve a restore argument to a path inside `dir`.
///
/// Only a bare file name is accepted; anything with a path component is
/// rejected before touching the filesystem.
pub fn resolve_backup(dir: &Path, name: &str) -> Result<PathBuf> {
    let is_bare = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().is_some_and(|f| f == name);
    if !is_bare {
        bail!("backup must be a file name inside the backup directory, got {name:?}");
    }

    let path = dir.join(name);
    if !path.is_file() {
        bail!("backup file not found: {}", path.display());
    }
    Ok(path)
}

/// Dump files in `dir`, newest first.
pub async fn list_backups(dir: &Path) -> Result<Vec<BackupFile>> {
    let mut backups = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(backups),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", dir.display()));
        }
    };

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(BACKUP_PREFIX) || !name.ends_with(BACKUP_SUFFIX) {
            continue;
        }
        let meta = entry.metadata().await?;
        if meta.is_file() {
            backups.push(BackupFile {
                name,
                size: meta.len(),
            });
        }
    }

    // Timestamped names sort chronologically.
    backups.sort_by(|a, b| b.name.cmp(&a.name));
    Ok(backups)
}

/// Dump the database at `url` into a new timestamped file in `dir`.
pub async fn create_backup(pg_dump: &str, url: &str, dir: &Path) -> Result<BackupFile> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create backup directory {}", dir.display()))?;

    let name = backup_file_name(OffsetDateTime::now_utc())?;
    let path = dir.join(&name);

    tracing::info!(tool = pg_dump, file = %name, "Creating backup");
    run_tool(
        pg_dump,
        &[format!("--dbname={url}"), "-f".to_string(), path_arg(&path)],
    )
    .await?;

    let size = tokio::fs::metadata(&path)
        .await
        .with_context(|| format!("{pg_dump} did not produce {}", path.display()))?
        .len();
    let size_mb = format!("{:.2}", size as f64 / (1024.0 * 1024.0));
    tracing::info!(file = %name, size_mb = %size_mb, "Backup created");

    Ok(BackupFile { name, size })
}

/// Replay a dump from `dir` into the database at `url`.
pub async fn restore_backup(psql: &str, url: &str, dir: &Path, name: &str) -> Result<()> {
    let path = resolve_backup(dir, name)?;

    tracing::info!(tool = psql, file = %name, "Restoring backup");
    run_tool(
        psql,
        &[
            format!("--dbname={url}"),
            "-v".to_string(),
            "ON_ERROR_STOP=1".to_string(),
            "-f".to_string(),
            path_arg(&path),
        ],
    )
    .await?;
    tracing::info!(file = %name, "Database restored");
    Ok(())
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

async fn run_tool(program: &str, args: &[String]) -> Result<()> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("failed to run {program}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{program} failed ({}): {}", output.status, stderr.trim());
    }
    Ok(())
}
