//! Pagination request and result types.

use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};

/// Default page size when a caller does not supply one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// One-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationParams {
    /// Page number, starting at 1
    pub page: u32,
    pub page_size: u32,
}

impl PaginationParams {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Reject pages or page sizes below 1.
    pub fn validate(&self) -> DbResult<()> {
        if self.page == 0 {
            return Err(DbError::invalid_input("page must be at least 1"));
        }
        if self.page_size == 0 {
            return Err(DbError::invalid_input("page_size must be at least 1"));
        }
        Ok(())
    }

    /// Number of rows skipped before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// A page of results with the unwindowed total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total_count: u64, params: PaginationParams) -> Self {
        Self {
            items,
            total_count,
            page: params.page,
            page_size: params.page_size,
        }
    }

    pub fn empty(total_count: u64, params: PaginationParams) -> Self {
        Self::new(Vec::new(), total_count, params)
    }

    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            0
        } else {
            self.total_count.div_ceil(u64::from(self.page_size))
        }
    }

    pub fn has_next_page(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }

    pub fn has_previous_page(&self) -> bool {
        self.page > 1
    }
}
