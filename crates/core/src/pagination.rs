//! Pagination normalization for image listings.

use crate::config::PaginationConfig;
use serde::{Deserialize, Serialize};

/// A normalized, 1-indexed page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    /// Build a page request from raw query values.
    ///
    /// A missing `page` means 1 and a missing `per_page` means the configured
    /// default. Values that are not integers, and pages below 1, are rejected.
    /// `per_page` is clamped into `[min_per_page, max_per_page]`.
    pub fn from_query(
        page: Option<&str>,
        per_page: Option<&str>,
        config: &PaginationConfig,
    ) -> crate::Result<Self> {
        let page = match page.map(str::trim) {
            None | Some("") => 1,
            Some(raw) => {
                let value: i64 = raw.parse().map_err(|_| {
                    crate::Error::InvalidPagination(format!("page must be an integer, got {raw:?}"))
                })?;
                if value < 1 {
                    return Err(crate::Error::InvalidPagination(format!(
                        "page must be at least 1, got {value}"
                    )));
                }
                u32::try_from(value).map_err(|_| {
                    crate::Error::InvalidPagination(format!("page {value} is out of range"))
                })?
            }
        };

        let per_page = match per_page.map(str::trim) {
            None | Some("") => i64::from(config.default_per_page),
            Some(raw) => raw.parse().map_err(|_| {
                crate::Error::InvalidPagination(format!(
                    "per_page must be an integer, got {raw:?}"
                ))
            })?,
        };
        let per_page = per_page.clamp(
            i64::from(config.min_per_page),
            i64::from(config.max_per_page),
        ) as u32;

        Ok(Self { page, per_page })
    }

    /// Rows to skip: `(page - 1) * per_page`.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    /// Rows to return.
    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn config() -> PaginationConfig {
        PaginationConfig {
            default_per_page: 10,
            min_per_page: 1,
            max_per_page: 50,
        }
    }

    #[test]
    fn test_defaults_when_missing() {
        let req = PageRequest::from_query(None, None, &PaginationConfig::default()).unwrap();
        assert_eq!(req, PageRequest { page: 1, per_page: 10 });
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_offset() {
        let req = PageRequest::from_query(Some("3"), Some("2"), &config()).unwrap();
        assert_eq!(req.offset(), 4);
        assert_eq!(req.limit(), 2);
    }

    #[test]
    fn test_per_page_is_clamped() {
        let req = PageRequest::from_query(Some("1"), Some("500"), &config()).unwrap();
        assert_eq!(req.per_page, 50);

        let req = PageRequest::from_query(Some("1"), Some("0"), &config()).unwrap();
        assert_eq!(req.per_page, 1);

        let req = PageRequest::from_query(Some("1"), Some("-7"), &config()).unwrap();
        assert_eq!(req.per_page, 1);

        let req = PageRequest::from_query(None, Some("2"), &PaginationConfig::default()).unwrap();
        assert_eq!(req.per_page, 10);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for (page, per_page) in [
            (Some("abc"), None),
            (Some("0"), None),
            (Some("-1"), None),
            (Some("1.5"), None),
            (None, Some("ten")),
            (Some("99999999999"), None),
        ] {
            assert!(
                matches!(
                    PageRequest::from_query(page, per_page, &config()),
                    Err(Error::InvalidPagination(_))
                ),
                "page={page:?} per_page={per_page:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_large_page_offset_does_not_overflow() {
        let req = PageRequest::from_query(Some("4294967295"), Some("50"), &config()).unwrap();
        assert_eq!(req.offset(), (u64::from(u32::MAX) - 1) * 50);
    }
}
