//! Shared query-parameter types for list endpoints.

use serde::Deserialize;

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: i64 = 25;

/// Upper bound for a requested page size.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page/size pagination parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl PageParams {
    /// The 1-based page, clamped to at least 1.
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// The page size, clamped to `1..=MAX_PAGE_SIZE`.
    pub fn size(&self) -> i64 {
        self.size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// Row offset of the first item on this page.
    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.size()
    }
}
