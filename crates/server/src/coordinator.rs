//! Ingestion and deletion across the file store and the metadata store.
//!
//! The two stores cannot share a transaction. Ingestion writes the file
//! first and removes it again if the metadata insert fails. Deletion removes
//! the record first and reports a file that could not be removed as an
//! orphan instead of restoring the record.
//!
//! Both multi-step sequences run on their own task: a request timeout drops
//! the handler future but never interrupts a sequence between its steps.

use crate::error::{ApiError, ApiResult};
use crate::metrics::{
    BYTES_UPLOADED, COMPENSATING_DELETES, IMAGES_DELETED, IMAGES_UPLOADED, ORPHANED_FILES,
    record_upload_rejection,
};
use crate::state::AppState;
use bytes::Bytes;
use picstash_core::{StoredName, ValidatedUpload, validate_upload};
use picstash_metadata::{ImageRow, NewImage};

/// A raw upload as received from the client.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    /// Client filename; `None` when the request had no file part.
    pub filename: Option<String>,
    /// Declared MIME type of the file part.
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Validate an upload, store its bytes, and record it.
///
/// Validation failures have no side effects. If the metadata insert fails
/// the stored file is removed before the error is returned.
pub async fn ingest(state: &AppState, upload: Upload) -> ApiResult<ImageRow> {
    let validated = validate_upload(
        upload.filename.as_deref(),
        upload.content_type.as_deref(),
        upload.data.len() as u64,
        &state.config.uploads,
    )
    .map_err(|e| {
        let err = ApiError::from(e);
        record_upload_rejection(err.code());
        err
    })?;

    let state = state.clone();
    let client_name = upload.filename.unwrap_or_default();
    tokio::spawn(async move {
        store_and_record(&state, validated, &client_name, upload.data).await
    })
    .await
    .map_err(|e| ApiError::Internal(format!("upload task failed: {e}")))?
}

async fn store_and_record(
    state: &AppState,
    upload: ValidatedUpload,
    client_name: &str,
    data: Bytes,
) -> ApiResult<ImageRow> {
    let size = i64::try_from(upload.size)
        .map_err(|_| ApiError::Internal(format!("size {} out of range", upload.size)))?;

    // The stored name takes its extension from the name the client sent.
    let stored = state.storage.save(client_name, data).await?;

    let new_image = NewImage {
        filename: stored.to_string(),
        original_name: upload.original_name,
        size,
        file_type: upload.file_type,
    };

    match state.metadata.insert_image(&new_image).await {
        Ok(row) => {
            IMAGES_UPLOADED.inc();
            BYTES_UPLOADED.inc_by(upload.size);
            tracing::info!(
                image_id = row.id,
                filename = %row.filename,
                size = row.size,
                "Image stored"
            );
            Ok(row)
        }
        Err(e) => {
            tracing::warn!(
                filename = %stored,
                error = %e,
                "Failed to record image in metadata, removing stored file"
            );
            remove_unrecorded_file(state, &stored).await;
            Err(e.into())
        }
    }
}

/// Compensation for a failed insert. Never fails the request on its own;
/// the insert error is what the caller reports.
async fn remove_unrecorded_file(state: &AppState, stored: &StoredName) {
    match state.storage.delete(stored.as_str()).await {
        Ok(removed) => {
            COMPENSATING_DELETES.inc();
            tracing::warn!(
                consistency = "compensated",
                filename = %stored,
                removed,
                "Removed file whose metadata insert failed"
            );
        }
        Err(cleanup_err) => {
            ORPHANED_FILES.inc();
            tracing::warn!(
                consistency = "orphan_file",
                filename = %stored,
                error = %cleanup_err,
                "Failed to remove file after metadata insert failure"
            );
        }
    }
}

/// Delete an image record and then its file.
///
/// Returns the stored filename. An unknown id is `NotFound` and touches no
/// file. A file that is already gone counts as removed.
pub async fn delete(state: &AppState, id: i64) -> ApiResult<String> {
    let state = state.clone();
    tokio::spawn(async move { remove_record_and_file(&state, id).await })
        .await
        .map_err(|e| ApiError::Internal(format!("delete task failed: {e}")))?
}

async fn remove_record_and_file(state: &AppState, id: i64) -> ApiResult<String> {
    let Some(filename) = state.metadata.delete_image(id).await? else {
        return Err(ApiError::NotFound(format!("image {id} not found")));
    };

    match state.storage.delete(&filename).await {
        Ok(removed) => {
            IMAGES_DELETED.inc();
            if !removed {
                tracing::warn!(
                    image_id = id,
                    filename = %filename,
                    "Image file was already missing"
                );
            }
            tracing::info!(image_id = id, filename = %filename, "Image deleted");
            Ok(filename)
        }
        Err(e) => {
            ORPHANED_FILES.inc();
            tracing::warn!(
                consistency = "orphan_file",
                image_id = id,
                filename = %filename,
                error = %e,
                "Image record deleted but file removal failed"
            );
            Err(ApiError::OrphanedFile {
                id,
                filename,
                source: e,
            })
        }
    }
}
