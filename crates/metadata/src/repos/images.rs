//! Image record repository trait.

use crate::error::MetadataResult;
use crate::models::{ImagePage, ImageRow, NewImage};
use async_trait::async_trait;
use picstash_core::PageRequest;

/// Repository for image records.
///
/// Every method checks a connection out of the pool for the duration of one
/// unit of work and hands it back on every exit path.
#[async_trait]
pub trait ImageRepo: Send + Sync {
    /// Insert a record and return it with its assigned id and upload time.
    ///
    /// Fails with `AlreadyExists` when `filename` is already taken.
    async fn insert_image(&self, image: &NewImage) -> MetadataResult<ImageRow>;

    /// List one page of records, newest first, plus the total row count.
    async fn list_images(&self, page: PageRequest) -> MetadataResult<ImagePage>;

    /// Pick one record uniformly at random, or `None` if there are no records.
    async fn pick_random_image(&self) -> MetadataResult<Option<ImageRow>>;

    /// Delete a record and return its stored filename.
    ///
    /// Returns `None` when no record has this id.
    async fn delete_image(&self, id: i64) -> MetadataResult<Option<String>>;

    /// Get a record by id.
    async fn get_image(&self, id: i64) -> MetadataResult<Option<ImageRow>>;

    /// Count all records.
    async fn count_images(&self) -> MetadataResult<u64>;
}
