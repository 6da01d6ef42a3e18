//! Image file storage for picstash.
//!
//! Files are written under random, server-generated names with atomic
//! temp-file-then-rename writes. Client filenames only contribute their
//! extension.

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::filesystem::FilesystemBackend;
pub use error::{StorageError, StorageResult};
pub use traits::ImageStore;

use picstash_core::config::StorageConfig;
use std::sync::Arc;

/// Create an image store from configuration, creating the upload root if needed.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ImageStore>> {
    if config.upload_dir.as_os_str().is_empty() {
        return Err(StorageError::Config(
            "storage.upload_dir cannot be empty".to_string(),
        ));
    }
    let backend = FilesystemBackend::new(&config.upload_dir).await?;
    Ok(Arc::new(backend))
}
