//! Shared response envelope types for API handlers.
//!
//! All API responses use a `{ "data": ... }` envelope. Use
//! [`DataResponse`] instead of ad-hoc `serde_json::json!({ "data": ... })`
//! to get compile-time type safety and consistent serialization.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// List envelope carrying items plus a pagination block.
#[derive(Debug, Serialize)]
pub struct PageResponse<T: Serialize> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Pagination metadata for list endpoints.
#[derive(Debug, Serialize)]
pub struct Pagination {
    /// Total rows matching the filter, across all pages.
    pub total: i64,
    pub page: i64,
    pub size: i64,
}
