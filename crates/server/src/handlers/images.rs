//! Image upload, listing, random pick, deletion and file serving.

use crate::coordinator::{self, Upload};
use crate::error::{ApiError, ApiResult};
use crate::metrics::record_upload_rejection;
use crate::state::AppState;
use axum::Json;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use picstash_core::{PageRequest, StoredName, format_size, mime_for_extension};
use picstash_metadata::ImageRow;
use picstash_storage::StorageError;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;

/// Image as presented to clients.
#[derive(Debug, Serialize)]
pub struct ImageView {
    pub id: i64,
    pub filename: String,
    pub original_name: String,
    /// Size in bytes.
    pub size: i64,
    /// Size formatted for display ("12.34 KB").
    pub size_human: String,
    /// RFC 3339 upload timestamp.
    pub upload_time: String,
    pub file_type: String,
    pub url: String,
    pub delete_url: String,
}

impl ImageView {
    pub fn from_row(state: &AppState, row: &ImageRow) -> Self {
        Self {
            id: row.id,
            filename: row.filename.clone(),
            original_name: row.original_name.clone(),
            size: row.size,
            size_human: format_size(row.size.max(0) as u64),
            upload_time: row
                .upload_time
                .format(&Rfc3339)
                .unwrap_or_else(|_| row.upload_time.to_string()),
            file_type: row.file_type.clone(),
            url: state.image_url(&row.filename),
            delete_url: state.delete_url(row.id),
        }
    }
}

/// Upload response.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: &'static str,
    pub image: ImageView,
}

/// Delete response.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: &'static str,
}

/// Paginated listing response.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub images: Vec<ImageView>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub pages: u64,
    /// Clamp bounds applied to `per_page`, so clients can size their pickers.
    pub min_per_page: u32,
    pub max_per_page: u32,
}

/// Random image response; `image` is null when there are no images.
#[derive(Debug, Serialize)]
pub struct RandomResponse {
    pub success: bool,
    pub image: Option<ImageView>,
}

/// Raw listing query parameters; parsed by [`PageRequest::from_query`].
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

fn multipart_error(state: &AppState, err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let err = ApiError::PayloadTooLarge {
            max: state.config.uploads.max_upload_bytes,
        };
        record_upload_rejection(err.code());
        err
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// POST /api/upload - Upload an image as multipart field `file`.
#[tracing::instrument(skip(state, multipart))]
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let mut upload = Upload::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&state, e))?
    {
        if field.name() != Some("file") {
            continue;
        }
        upload.filename = field.file_name().map(str::to_string);
        upload.content_type = field.content_type().map(str::to_string);
        upload.data = field.bytes().await.map_err(|e| multipart_error(&state, e))?;
        break;
    }

    let row = coordinator::ingest(&state, upload).await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            success: true,
            message: "File uploaded successfully",
            image: ImageView::from_row(&state, &row),
        }),
    ))
}

/// GET /api/images?page=&per_page= - List images, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_images(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListResponse>> {
    let page = PageRequest::from_query(
        params.page.as_deref(),
        params.per_page.as_deref(),
        &state.config.pagination,
    )?;

    let result = state.metadata.list_images(page).await?;
    let images = result
        .images
        .iter()
        .map(|row| ImageView::from_row(&state, row))
        .collect();

    Ok(Json(ListResponse {
        success: true,
        images,
        total: result.total,
        page: page.page,
        per_page: page.per_page,
        pages: result.total.div_ceil(u64::from(page.per_page)),
        min_per_page: state.config.pagination.min_per_page,
        max_per_page: state.config.pagination.max_per_page,
    }))
}

/// GET /api/random - One random image, or null if there are none.
#[tracing::instrument(skip(state))]
pub async fn random_image(State(state): State<AppState>) -> ApiResult<Json<RandomResponse>> {
    let row = state.metadata.pick_random_image().await?;
    Ok(Json(RandomResponse {
        success: true,
        image: row.map(|row| ImageView::from_row(&state, &row)),
    }))
}

/// DELETE /api/images/{id} - Delete an image record and its file.
#[tracing::instrument(skip(state))]
pub async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let id: i64 = id
        .parse()
        .map_err(|_| ApiError::NotFound(format!("image {id} not found")))?;

    coordinator::delete(&state, id).await?;

    Ok(Json(DeleteResponse {
        success: true,
        message: "Image deleted successfully",
    }))
}

/// GET /images/{filename} - Raw image bytes.
#[tracing::instrument(skip(state))]
pub async fn serve_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    let not_found = || ApiError::NotFound(format!("image file {filename} not found"));

    let name = StoredName::new(filename.as_str()).map_err(|_| not_found())?;
    let data = match state.storage.get(name.as_str()).await {
        Ok(data) => data,
        Err(StorageError::NotFound(_) | StorageError::InvalidKey(_)) => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };

    let content_type = mime_for_extension(&name.extension().unwrap_or_default());
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        data,
    )
        .into_response())
}
