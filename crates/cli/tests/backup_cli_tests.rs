#![allow(deprecated)] // cargo_bin is deprecated but still functional

use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// picstashctl with a config file that does not exist and no ambient DB URL.
fn picstashctl(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("picstashctl").unwrap();
    cmd.env("PICSTASH_CONFIG", temp.path().join("absent.toml"))
        .env("PICSTASH_BACKUP__DIR", temp.path().join("backup"))
        .env_remove("DATABASE_URL")
        .env_remove("PICSTASH_METADATA__TYPE")
        .env_remove("PICSTASH_METADATA__URL");
    cmd
}

fn backup_dir(temp: &TempDir) -> std::path::PathBuf {
    let dir = temp.path().join("backup");
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn list_empty_backup_dir() {
    let temp = TempDir::new().unwrap();

    picstashctl(&temp)
        .args(["backup", "list"])
        .assert()
        .success()
        .stdout(contains("No backups"));
}

#[test]
fn list_shows_newest_first() {
    let temp = TempDir::new().unwrap();
    let dir = backup_dir(&temp);
    fs::write(dir.join("backup_2024-01-01_000000.sql"), "old").unwrap();
    fs::write(dir.join("backup_2025-01-01_000000.sql"), "new").unwrap();

    let output = picstashctl(&temp)
        .args(["backup", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let newer = stdout.find("backup_2025-01-01_000000.sql").unwrap();
    let older = stdout.find("backup_2024-01-01_000000.sql").unwrap();
    assert!(newer < older, "{stdout}");
}

#[test]
fn backup_dir_flag_overrides_config() {
    let temp = TempDir::new().unwrap();
    let other = temp.path().join("elsewhere");
    fs::create_dir_all(&other).unwrap();
    fs::write(other.join("backup_2024-05-05_050505.sql"), "x").unwrap();

    picstashctl(&temp)
        .args(["backup", "list", "--backup-dir"])
        .arg(&other)
        .assert()
        .success()
        .stdout(contains("backup_2024-05-05_050505.sql"));
}

#[test]
fn restore_rejects_path_components() {
    let temp = TempDir::new().unwrap();
    backup_dir(&temp);

    picstashctl(&temp)
        .env("DATABASE_URL", "postgresql://localhost/images")
        .args(["backup", "restore", "../absent.toml"])
        .assert()
        .failure()
        .stderr(contains("file name"));
}

#[test]
fn restore_missing_file_fails() {
    let temp = TempDir::new().unwrap();
    backup_dir(&temp);

    picstashctl(&temp)
        .env("DATABASE_URL", "postgresql://localhost/images")
        .args(["backup", "restore", "backup_1999-01-01_000000.sql"])
        .assert()
        .failure()
        .stderr(contains("not found"));
}

#[test]
fn create_requires_postgres() {
    let temp = TempDir::new().unwrap();

    picstashctl(&temp)
        .args(["backup", "create"])
        .assert()
        .failure()
        .stderr(contains("PostgreSQL"));
}

#[cfg(unix)]
fn fake_tool(dir: &Path, name: &str, script: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
#[test]
fn create_runs_pg_dump_into_timestamped_file() {
    let temp = TempDir::new().unwrap();
    // Writes its arguments into the file named after -f.
    let pg_dump = fake_tool(
        temp.path(),
        "fake-pg-dump",
        "#!/bin/sh\nall=\"$*\"\nwhile [ $# -gt 0 ]; do\n  if [ \"$1\" = \"-f\" ]; then echo \"$all\" > \"$2\"; fi\n  shift\ndone\n",
    );

    picstashctl(&temp)
        .env("DATABASE_URL", "postgresql://app@db:5432/images")
        .env("PICSTASH_PG_DUMP", &pg_dump)
        .args(["backup", "create"])
        .assert()
        .success()
        .stdout(contains("Backup created: backup_"));

    let entries: Vec<_> = fs::read_dir(temp.path().join("backup"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries.len(), 1);
    let name = &entries[0];
    assert!(name.starts_with("backup_") && name.ends_with(".sql"), "{name}");

    let contents = fs::read_to_string(temp.path().join("backup").join(name)).unwrap();
    assert!(contents.contains("--dbname=postgresql://app@db:5432/images"));
}

#[cfg(unix)]
#[test]
fn failed_restore_reports_tool_error() {
    let temp = TempDir::new().unwrap();
    let dir = backup_dir(&temp);
    fs::write(dir.join("backup_2024-01-01_000000.sql"), "SELECT 1;").unwrap();
    let psql = fake_tool(
        temp.path(),
        "fake-psql",
        "#!/bin/sh\necho 'connection refused' >&2\nexit 2\n",
    );

    picstashctl(&temp)
        .env("DATABASE_URL", "postgresql://localhost/images")
        .env("PICSTASH_PSQL", &psql)
        .args(["backup", "restore", "backup_2024-01-01_000000.sql"])
        .assert()
        .failure()
        .stderr(contains("connection refused"));
}
