//! Local filesystem storage backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::ImageStore;
use async_trait::async_trait;
use bytes::Bytes;
use picstash_core::{StoredName, generate_unique_name};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Image files stored flat in one directory.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend, creating the root directory if needed.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Directory holding the stored files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the full path for a name, with path traversal protection.
    ///
    /// This is an async wrapper around `name_path_sync` that uses `spawn_blocking`
    /// to avoid blocking the Tokio runtime during `canonicalize` and
    /// `symlink_metadata`.
    async fn name_path(&self, name: &str) -> StorageResult<PathBuf> {
        let root = self.root.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || Self::name_path_sync(&root, &name))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }

    /// Synchronous name validation with path traversal protection.
    ///
    /// A name must be a valid [`StoredName`]: one path component, no leading
    /// dot, only `[A-Za-z0-9._-]`. An existing entry must not be a symlink
    /// that resolves outside the root.
    fn name_path_sync(root: &Path, name: &str) -> StorageResult<PathBuf> {
        let name = StoredName::new(name)
            .map_err(|e| StorageError::InvalidKey(format!("{e}: {name:?}")))?;

        let path = root.join(name.as_str());

        match std::fs::symlink_metadata(&path) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let root_canonical = root.canonicalize().map_err(|e| {
                    StorageError::Io(std::io::Error::new(
                        e.kind(),
                        format!("failed to canonicalize root: {e}"),
                    ))
                })?;
                let canonical = path.canonicalize().map_err(|_| {
                    StorageError::InvalidKey(format!("symlink target missing or invalid: {name}"))
                })?;
                if !canonical.starts_with(&root_canonical) {
                    return Err(StorageError::InvalidKey(format!(
                        "resolved path escapes storage root: {name}"
                    )));
                }
                Ok(path)
            }
            Ok(_) => Ok(path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(path),
            Err(err) => Err(StorageError::Io(std::io::Error::new(
                err.kind(),
                format!("failed to stat path: {err}"),
            ))),
        }
    }

    fn map_not_found(name: &str, e: std::io::Error) -> StorageError {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(name.to_string())
        } else {
            StorageError::Io(e)
        }
    }

    /// Write to a hidden temp file, fsync, then rename into place.
    async fn write_atomic(&self, path: &Path, name: &StoredName, data: &[u8]) -> StorageResult<()> {
        // Leading dot keeps in-flight temp files from ever being a valid stored name.
        let temp_path = path.with_file_name(format!(".{name}.tmp.{}", Uuid::new_v4()));

        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            // Ensure data is flushed to disk before rename
            file.sync_all().await?;
            fs::rename(&temp_path, path).await
        }
        .await;

        if let Err(e) = written {
            if let Err(cleanup_err) = fs::remove_file(&temp_path).await
                && cleanup_err.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(
                    temp_path = %temp_path.display(),
                    error = %cleanup_err,
                    "Failed to remove temp file after write failure"
                );
            }
            return Err(StorageError::Io(e));
        }
        Ok(())
    }
}

#[async_trait]
impl ImageStore for FilesystemBackend {
    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn save(&self, original_name: &str, data: Bytes) -> StorageResult<StoredName> {
        let name = generate_unique_name(original_name);
        let path = self.name_path(name.as_str()).await?;

        if fs::try_exists(&path).await? {
            return Err(StorageError::AlreadyExists(name.to_string()));
        }

        self.write_atomic(&path, &name, &data).await?;
        tracing::debug!(stored_name = %name, "Stored image file");
        Ok(name)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, name: &str) -> StorageResult<bool> {
        let path = self.name_path(name).await?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(stored_name = name, "File already absent, nothing to delete");
                Ok(false)
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, name: &str) -> StorageResult<Bytes> {
        let path = self.name_path(name).await?;
        let data = fs::read(&path)
            .await
            .map_err(|e| Self::map_not_found(name, e))?;
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, name: &str) -> StorageResult<bool> {
        let path = self.name_path(name).await?;
        fs::try_exists(&path).await.map_err(StorageError::Io)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        // Verify the root directory exists and is accessible
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("storage root is not a directory: {:?}", self.root),
            )));
        }

        if metadata.permissions().readonly() {
            return Err(StorageError::Config(format!(
                "storage root is read-only: {:?}",
                self.root
            )));
        }

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}
