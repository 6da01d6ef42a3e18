//! Error types for the core domain.

use thiserror::Error;

/// Validation error raised before any side effect takes place.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no file provided")]
    MissingFile,

    #[error("uploaded file is empty")]
    EmptyFile,

    #[error("unsupported file extension: {0:?}")]
    UnsupportedExtension(String),

    #[error("unsupported content type: {0:?}")]
    UnsupportedMimeType(String),

    #[error("file too large: {size} bytes (maximum is {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("invalid pagination: {0}")]
    InvalidPagination(String),

    #[error("invalid filename: {0}")]
    InvalidFilename(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
