//! Upload acceptance policy.
//!
//! Checks run in a fixed order and the first failure wins:
//! 1. a file part is present and non-empty
//! 2. the extension is on the allow-list
//! 3. the declared content type is on the allow-list
//! 4. the byte length does not exceed the configured maximum
//!
//! Nothing here touches disk or the database.

use crate::config::UploadConfig;
use crate::image::{file_extension, sanitize_filename};
use serde::{Deserialize, Serialize};

/// An upload that passed every acceptance check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedUpload {
    /// Sanitized client filename, kept for display.
    pub original_name: String,
    /// Lower-cased extension without the leading dot.
    pub file_type: String,
    /// Byte length of the content.
    pub size: u64,
}

/// Validate an incoming upload against the configured rules.
///
/// `filename` is `None` when the request carried no file part at all.
/// `content_type` is the MIME type declared by the client for that part.
pub fn validate_upload(
    filename: Option<&str>,
    content_type: Option<&str>,
    size: u64,
    config: &UploadConfig,
) -> crate::Result<ValidatedUpload> {
    let filename = match filename {
        Some(name) if !name.trim().is_empty() => name,
        _ => return Err(crate::Error::MissingFile),
    };
    if size == 0 {
        return Err(crate::Error::EmptyFile);
    }

    // The extension comes from the client name as sent; sanitizing drops
    // non-ASCII stems and would lose it.
    let extension = file_extension(filename);
    let file_type = match extension {
        Some(ext) if config.extension_allowed(&ext) => ext,
        other => return Err(crate::Error::UnsupportedExtension(other.unwrap_or_default())),
    };
    let original_name = sanitize_filename(filename);

    let content_type = content_type.unwrap_or_default();
    if !config.mime_allowed(content_type) {
        return Err(crate::Error::UnsupportedMimeType(content_type.to_string()));
    }

    if size > config.max_upload_bytes {
        return Err(crate::Error::FileTooLarge {
            size,
            max: config.max_upload_bytes,
        });
    }

    Ok(ValidatedUpload {
        original_name,
        file_type,
        size,
    })
}
