//! Database models mapping to the metadata schema.

use sqlx::FromRow;
use time::OffsetDateTime;

/// A persisted image record.
///
/// Rows are only ever inserted and deleted; no column is updated in place.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ImageRow {
    pub id: i64,
    /// Server-generated name of the file in the upload root.
    pub filename: String,
    /// Sanitized client filename, for display only.
    pub original_name: String,
    pub size: i64,
    pub upload_time: OffsetDateTime,
    /// Lower-cased extension without the leading dot.
    pub file_type: String,
}

/// Columns supplied by the caller when inserting a record.
///
/// `id` and `upload_time` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImage {
    pub filename: String,
    pub original_name: String,
    pub size: i64,
    pub file_type: String,
}

/// One page of a listing plus the unfiltered row count.
#[derive(Debug, Clone, Default)]
pub struct ImagePage {
    pub images: Vec<ImageRow>,
    pub total: u64,
}
