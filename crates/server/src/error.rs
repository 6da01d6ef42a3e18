//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use picstash_metadata::MetadataError;
use picstash_storage::StorageError;
use serde::Serialize;

/// Message returned for server-side failures; details only go to the log.
const OPAQUE_MESSAGE: &str = "internal server error";

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub error: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(#[from] picstash_core::Error),

    #[error("file too large (maximum is {max} bytes)")]
    PayloadTooLarge { max: u64 },

    /// Metadata row is gone but the file could not be removed.
    #[error("image {id} deleted but file {filename} could not be removed: {source}")]
    OrphanedFile {
        id: i64,
        filename: String,
        #[source]
        source: StorageError,
    },

    #[error("request timed out")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Validation(e) => match e {
                picstash_core::Error::MissingFile => "missing_file",
                picstash_core::Error::EmptyFile => "empty_file",
                picstash_core::Error::UnsupportedExtension(_) => "unsupported_extension",
                picstash_core::Error::UnsupportedMimeType(_) => "unsupported_mime_type",
                picstash_core::Error::FileTooLarge { .. } => "file_too_large",
                picstash_core::Error::InvalidPagination(_) => "invalid_pagination",
                picstash_core::Error::InvalidFilename(_) => "invalid_filename",
            },
            Self::PayloadTooLarge { .. } => "file_too_large",
            Self::OrphanedFile { .. } => "orphaned_file",
            Self::Timeout => "timeout",
            Self::Internal(_) => "internal_error",
            Self::Storage(_) => "storage_error",
            Self::Metadata(MetadataError::Unavailable { .. }) => "database_unavailable",
            Self::Metadata(_) => "metadata_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::BAD_REQUEST,
            Self::OrphanedFile { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Metadata(MetadataError::Unavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Metadata(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to clients.
    fn public_message(&self) -> String {
        match self {
            Self::OrphanedFile { id, .. } => {
                format!("image {id} was deleted but its file could not be removed")
            }
            Self::Timeout => "request timed out".to_string(),
            Self::Metadata(MetadataError::Unavailable { .. }) => {
                "database temporarily unavailable".to_string()
            }
            e if e.status_code().is_server_error() => OPAQUE_MESSAGE.to_string(),
            Self::NotFound(msg) | Self::BadRequest(msg) => msg.clone(),
            e => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "Request rejected");
        }
        let body = ErrorResponse {
            success: false,
            code: self.code().to_string(),
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
