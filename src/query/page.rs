//! Pagination request and result envelope.

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

// == Page Request ==
/// One-based page number and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Creates a validated request.
    pub fn new(page: u32, page_size: u32) -> Result<Self> {
        let request = Self { page, page_size };
        request.validate()?;
        Ok(request)
    }

    /// Rejects `page == 0` and `page_size == 0`. Invalid pages are never
    /// renumbered.
    pub fn validate(&self) -> Result<()> {
        if self.page < 1 {
            return Err(CacheError::InvalidArgument(format!(
                "page must be >= 1, got {}",
                self.page
            )));
        }
        if self.page_size < 1 {
            return Err(CacheError::InvalidArgument(format!(
                "page_size must be >= 1, got {}",
                self.page_size
            )));
        }
        Ok(())
    }

    /// Zero-based index of the first row on this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// Inclusive row range `(first, last)` covered by this page.
    pub fn range(&self) -> (u64, u64) {
        let first = self.offset();
        (first, first + u64::from(self.page_size.max(1)) - 1)
    }
}

// == Paginated Result ==
/// A page of rows plus the metadata needed to page through the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResult<T> {
    /// Rows on this page, in server order
    pub data: Vec<T>,
    /// Matching rows server-side, independent of page size
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    /// `ceil(total / page_size)`; 0 when there are no rows
    pub total_pages: u64,
}

impl<T> PaginatedResult<T> {
    /// Builds the envelope for `request`, truncating `data` to the page size.
    pub fn new(mut data: Vec<T>, total: u64, request: PageRequest) -> Self {
        data.truncate(request.page_size as usize);
        Self {
            data,
            total,
            page: request.page,
            page_size: request.page_size,
            total_pages: total_pages(total, request.page_size),
        }
    }

    /// An empty page. Not an error.
    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), 0, request)
    }

    pub fn has_next_page(&self) -> bool {
        u64::from(self.page) < self.total_pages
    }

    /// Converts every row, keeping the metadata.
    pub fn map<U, F>(self, f: F) -> PaginatedResult<U>
    where
        F: FnMut(T) -> U,
    {
        PaginatedResult {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
        }
    }
}

/// Number of pages needed for `total` rows at `page_size` per page.
pub fn total_pages(total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(u64::from(page_size))
}
