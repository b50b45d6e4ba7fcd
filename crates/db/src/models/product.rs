//! Product models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stockpile_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A product row from the `products` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: DbId,
    pub name: String,
    /// Raw SKU as supplied (trimmed).
    pub sku: String,
    /// Derived uniqueness key; never settable independently.
    pub sku_normalized: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// Input for creating (or overwriting-by-SKU) a product.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub active: Option<bool>,
}

// ---------------------------------------------------------------------------
// Update DTO
// ---------------------------------------------------------------------------

/// Input for partially updating a product. Absent fields are unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

// ---------------------------------------------------------------------------
// Query filter
// ---------------------------------------------------------------------------

/// Filters for the product list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Case-insensitive exact match on the normalized SKU.
    pub sku: Option<String>,
    /// Case-insensitive substring match on the name.
    pub name: Option<String>,
    /// Case-insensitive substring match on the description.
    pub description: Option<String>,
    pub active: Option<bool>,
}
