//! Core domain types and shared logic for the picstash image host.
//!
//! This crate defines the pieces every other crate agrees on:
//! - Configuration sections and their defaults
//! - The validation error taxonomy
//! - Stored-name generation and client filename sanitizing
//! - Upload acceptance policy
//! - Pagination normalization

pub mod config;
pub mod error;
pub mod image;
pub mod pagination;
pub mod upload;

pub use error::{Error, Result};
pub use image::{
    StoredName, file_extension, format_size, generate_unique_name, mime_for_extension,
    sanitize_filename,
};
pub use pagination::PageRequest;
pub use upload::{ValidatedUpload, validate_upload};

/// Default maximum upload size: 5 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;
