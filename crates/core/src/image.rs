//! Stored image names, client filename sanitizing, and display helpers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Longest stored name accepted from a URL or the database.
const MAX_STORED_NAME_LEN: usize = 255;

/// A server-generated name under which an image file lives in the upload root.
///
/// Always a single path component made of `[A-Za-z0-9._-]` that does not
/// start with a dot, so it can be joined onto the upload root without
/// escaping it.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoredName(String);

impl StoredName {
    /// Create from a string, validating format.
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(crate::Error::InvalidFilename("empty name".to_string()));
        }
        if name.len() > MAX_STORED_NAME_LEN {
            return Err(crate::Error::InvalidFilename(format!(
                "name exceeds {MAX_STORED_NAME_LEN} bytes"
            )));
        }
        if name.starts_with('.') {
            return Err(crate::Error::InvalidFilename(
                "name must not start with '.'".to_string(),
            ));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(crate::Error::InvalidFilename(format!(
                "invalid character in name: {c:?}"
            )));
        }
        Ok(Self(name))
    }

    /// Get the name string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased extension without the leading dot, if any.
    pub fn extension(&self) -> Option<String> {
        file_extension(&self.0)
    }
}

impl TryFrom<String> for StoredName {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<StoredName> for String {
    fn from(name: StoredName) -> Self {
        name.0
    }
}

impl AsRef<str> for StoredName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StoredName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoredName({})", self.0)
    }
}

impl fmt::Display for StoredName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reduce a client-supplied filename to a safe display name.
///
/// Directory components are dropped, whitespace runs become `_`, characters
/// outside `[A-Za-z0-9._-]` are removed, and leading/trailing dots and
/// underscores are stripped. May return an empty string.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");

    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Lower-cased extension of `filename` without the leading dot.
///
/// A name without a dot, or ending in a dot, has no extension. A leading dot
/// alone (".png") does not count as an extension separator.
pub fn file_extension(filename: &str) -> Option<String> {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Generate a random, collision-resistant stored name that keeps the
/// original extension (lower-cased).
///
/// The original name never contributes anything but its extension.
pub fn generate_unique_name(original_name: &str) -> StoredName {
    let id = Uuid::new_v4();
    let ext: String = file_extension(original_name)
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let name = if ext.is_empty() {
        id.to_string()
    } else {
        format!("{id}.{ext}")
    };
    StoredName(name)
}

/// Human-readable size: bytes below 1 KiB, then KB and MB with two decimals.
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    if bytes < KIB {
        format!("{bytes} B")
    } else if bytes < MIB {
        format!("{:.2} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MIB as f64)
    }
}

/// Content type served for a stored file extension.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\cat.png"), "cat.png");
        assert_eq!(sanitize_filename("/abs/path/dog.JPG"), "dog.JPG");
    }

    #[test]
    fn test_sanitize_whitespace_and_symbols() {
        assert_eq!(sanitize_filename("my cute  cat.png"), "my_cute_cat.png");
        assert_eq!(sanitize_filename("héllo wörld!.gif"), "hllo_wrld.gif");
        assert_eq!(sanitize_filename("..hidden.png"), "hidden.png");
        assert_eq!(sanitize_filename("..."), "");
        assert_eq!(sanitize_filename(""), "");
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("photo.PNG").as_deref(), Some("png"));
        assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(file_extension("noext"), None);
        assert_eq!(file_extension(".png"), None);
        assert_eq!(file_extension("trailing."), None);
        assert_eq!(file_extension("dir.d/file"), None);
    }

    #[test]
    fn test_generate_unique_name_keeps_lowercased_extension() {
        let name = generate_unique_name("Holiday Photo.JPEG");
        assert!(name.as_str().ends_with(".jpeg"));
        assert_eq!(name.as_str().len(), 36 + ".jpeg".len());
        assert_eq!(name.extension().as_deref(), Some("jpeg"));
        assert!(StoredName::new(name.as_str()).is_ok());
    }

    #[test]
    fn test_generate_unique_name_non_ascii_stem() {
        let name = generate_unique_name("фото.png");
        assert_eq!(name.extension().as_deref(), Some("png"));
        assert_eq!(name.as_str().len(), 36 + ".png".len());

        let name = generate_unique_name("我的 照片.JPG");
        assert!(name.as_str().ends_with(".jpg"));
        assert!(StoredName::new(name.as_str()).is_ok());
    }

    #[test]
    fn test_generate_unique_name_drops_non_alphanumeric_extension_chars() {
        let name = generate_unique_name("x.p-n g");
        assert!(name.as_str().ends_with(".png"));
        assert!(StoredName::new(name.as_str()).is_ok());
    }

    #[test]
    fn test_generate_unique_name_is_random() {
        let a = generate_unique_name("a.png");
        let b = generate_unique_name("a.png");
        assert_ne!(a, b);
    }

    #[test]
    fn test_generate_unique_name_ignores_traversal() {
        let name = generate_unique_name("../../../evil.png");
        assert!(!name.as_str().contains('/'));
        assert!(!name.as_str().contains(".."));
        assert!(name.as_str().ends_with(".png"));
    }

    #[test]
    fn test_stored_name_validation() {
        assert!(StoredName::new("0b6e1c9a-1f1e-4c55-9a43-6c3d2f1e0a11.png").is_ok());
        assert!(StoredName::new("").is_err());
        assert!(StoredName::new("..").is_err());
        assert!(StoredName::new(".hidden").is_err());
        assert!(StoredName::new("a/b.png").is_err());
        assert!(StoredName::new("a\\b.png").is_err());
        assert!(StoredName::new("a b.png").is_err());
        assert!(StoredName::new("x".repeat(256)).is_err());
    }

    #[test]
    fn test_stored_name_serde() {
        let name: StoredName = serde_json::from_str("\"abc.png\"").unwrap();
        assert_eq!(name.as_str(), "abc.png");
        assert!(serde_json::from_str::<StoredName>("\"../abc.png\"").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for_extension("JPG"), "image/jpeg");
        assert_eq!(mime_for_extension("png"), "image/png");
        assert_eq!(mime_for_extension("bin"), "application/octet-stream");
    }
}
