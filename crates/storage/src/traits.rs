//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use picstash_core::StoredName;

/// Persistence for image file bytes, addressed by server-generated names.
///
/// Names handed to `delete`, `get` and `exists` are validated as a single
/// safe path component before any filesystem access; anything else is
/// rejected with `InvalidKey`.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Write `data` under a newly generated unique name and return that name.
    ///
    /// Only the (lower-cased) extension of `original_name` is kept; the rest
    /// of the client-supplied name never reaches the filesystem.
    async fn save(&self, original_name: &str, data: Bytes) -> StorageResult<StoredName>;

    /// Remove a stored file.
    ///
    /// Returns `false` when there was nothing to remove. Removing the same
    /// name twice is not an error.
    async fn delete(&self, name: &str) -> StorageResult<bool>;

    /// Read a stored file.
    async fn get(&self, name: &str) -> StorageResult<Bytes>;

    /// Check whether a stored file exists.
    async fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Check that the backend is usable.
    async fn health_check(&self) -> StorageResult<()>;

    /// Get the backend name (for logging/metrics).
    fn backend_name(&self) -> &'static str;
}
