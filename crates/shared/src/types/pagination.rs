//! Pagination types for report pages.

use serde::{Deserialize, Serialize};

/// Request parameters for a paginated report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number (1-indexed).
    #[serde(default = "default_page")]
    pub page: u32,
    /// Number of top-level groups per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PageRequest {
    /// Creates a page request.
    #[must_use]
    pub const fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Checks the request against the allowed page size.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first out-of-range field.
    pub fn validate(&self, max_page_size: u32) -> Result<(), String> {
        if self.page == 0 {
            return Err("page must be at least 1".to_string());
        }
        if self.page_size == 0 || self.page_size > max_page_size {
            return Err(format!("page_size must be between 1 and {max_page_size}"));
        }
        Ok(())
    }

    /// Index of the first item on this page.
    #[must_use]
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.page_size as usize)
    }

    /// Returns the page size as a slice length.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.page_size as usize
    }
}

/// Pagination metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub page_size: u32,
    /// Total number of items across all pages.
    pub total_records: u64,
    /// Total number of pages; zero when there are no items.
    pub total_pages: u64,
}

impl PageMeta {
    /// Builds metadata for `total_records` items.
    #[must_use]
    pub fn new(request: PageRequest, total_records: u64) -> Self {
        let total_pages = if request.page_size == 0 {
            0
        } else {
            total_records.div_ceil(u64::from(request.page_size))
        };

        Self {
            page: request.page,
            page_size: request.page_size,
            total_records,
            total_pages,
        }
    }
}

#[cfg(test)]
#[path = "pagination_tests.rs"]
mod tests;
