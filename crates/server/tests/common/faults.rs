//! Store wrappers that inject failures.

use async_trait::async_trait;
use bytes::Bytes;
use picstash_core::{PageRequest, StoredName};
use picstash_metadata::sqlx;
use picstash_metadata::{
    ImagePage, ImageRepo, ImageRow, MetadataError, MetadataResult, MetadataStore, NewImage,
};
use picstash_storage::{ImageStore, StorageError, StorageResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Failure mode of [`FaultyMetadata`].
#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum MetadataFault {
    /// `insert_image` fails after the file has been written.
    FailInsert,
    /// `list_images` sleeps before answering.
    SlowList(Duration),
    /// Every call reports the database as unavailable.
    Unavailable,
}

/// Metadata store that delegates to a real store except for one fault.
pub struct FaultyMetadata {
    inner: Arc<dyn MetadataStore>,
    fault: MetadataFault,
}

#[allow(dead_code)]
impl FaultyMetadata {
    pub fn wrap(inner: Arc<dyn MetadataStore>, fault: MetadataFault) -> Arc<dyn MetadataStore> {
        Arc::new(Self { inner, fault })
    }

    fn unavailable(&self) -> MetadataResult<()> {
        match self.fault {
            MetadataFault::Unavailable => Err(MetadataError::Unavailable {
                attempts: 3,
                source: sqlx::Error::PoolTimedOut,
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ImageRepo for FaultyMetadata {
    async fn insert_image(&self, image: &NewImage) -> MetadataResult<ImageRow> {
        self.unavailable()?;
        if let MetadataFault::FailInsert = self.fault {
            return Err(MetadataError::AlreadyExists(image.filename.clone()));
        }
        self.inner.insert_image(image).await
    }

    async fn list_images(&self, page: PageRequest) -> MetadataResult<ImagePage> {
        self.unavailable()?;
        if let MetadataFault::SlowList(delay) = self.fault {
            tokio::time::sleep(delay).await;
        }
        self.inner.list_images(page).await
    }

    async fn pick_random_image(&self) -> MetadataResult<Option<ImageRow>> {
        self.unavailable()?;
        self.inner.pick_random_image().await
    }

    async fn delete_image(&self, id: i64) -> MetadataResult<Option<String>> {
        self.unavailable()?;
        self.inner.delete_image(id).await
    }

    async fn get_image(&self, id: i64) -> MetadataResult<Option<ImageRow>> {
        self.unavailable()?;
        self.inner.get_image(id).await
    }

    async fn count_images(&self) -> MetadataResult<u64> {
        self.unavailable()?;
        self.inner.count_images().await
    }
}

#[async_trait]
impl MetadataStore for FaultyMetadata {
    async fn ensure_schema(&self) -> MetadataResult<()> {
        self.inner.ensure_schema().await
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.unavailable()?;
        self.inner.health_check().await
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

/// Image store that counts saves and deletes and can be told to fail deletes.
pub struct RecordingStorage {
    inner: Arc<dyn ImageStore>,
    fail_deletes: bool,
    save_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

#[allow(dead_code)]
impl RecordingStorage {
    pub fn new(inner: Arc<dyn ImageStore>, fail_deletes: bool) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_deletes,
            save_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        })
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageStore for RecordingStorage {
    async fn save(&self, original_name: &str, data: Bytes) -> StorageResult<StoredName> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.save(original_name, data).await
    }

    async fn delete(&self, name: &str) -> StorageResult<bool> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "injected delete failure",
            )));
        }
        self.inner.delete(name).await
    }

    async fn get(&self, name: &str) -> StorageResult<Bytes> {
        self.inner.get(name).await
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        self.inner.exists(name).await
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.inner.health_check().await
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}
