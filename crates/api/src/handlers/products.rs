//! Handlers for product CRUD and bulk deletion.
//!
//! Every mutation fans out a webhook event after commit; event delivery is
//! best-effort and never affects the HTTP response.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use stockpile_core::error::CoreError;
use stockpile_core::events::WebhookEventType;
use stockpile_core::sku::{normalize_sku, trim_sku};
use stockpile_core::types::DbId;
use stockpile_db::models::product::{CreateProduct, Product, ProductFilter, UpdateProduct};
use stockpile_db::repositories::ProductRepo;

use crate::error::{AppError, AppResult};
use crate::query::PageParams;
use crate::response::{DataResponse, PageResponse, Pagination};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// List / read
// ---------------------------------------------------------------------------

/// GET /api/v1/products
///
/// Paginated product listing with optional filters: `sku` (case-insensitive
/// exact match), `name` / `description` (case-insensitive contains),
/// `active`.
pub async fn list_products(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(filter): Query<ProductFilter>,
) -> AppResult<impl IntoResponse> {
    let (items, total) =
        ProductRepo::list(&state.pool, &filter, page.size(), page.offset()).await?;

    Ok(Json(PageResponse {
        items,
        pagination: Pagination {
            total,
            page: page.page(),
            size: page.size(),
        },
    }))
}

/// GET /api/v1/products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let product = ProductRepo::find_by_id(&state.pool, product_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Product",
            id: product_id,
        }))?;
    Ok(Json(DataResponse { data: product }))
}

// ---------------------------------------------------------------------------
// Create (create-or-overwrite by SKU)
// ---------------------------------------------------------------------------

/// POST /api/v1/products
///
/// Creates a product, or fully overwrites the existing product holding the
/// same normalized SKU. Emits `product.created` or `product.updated`
/// accordingly.
pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<CreateProduct>,
) -> AppResult<impl IntoResponse> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name must not be empty".into()));
    }
    let sku = trim_sku(&input.sku);
    if sku.is_empty() {
        return Err(AppError::BadRequest("sku must not be empty".into()));
    }
    let sku_normalized = normalize_sku(&input.sku);
    let description = normalized_description(input.description.as_deref());
    let active = input.active.unwrap_or(true);

    let existing = ProductRepo::find_by_normalized_sku(&state.pool, &sku_normalized).await?;
    let (product, event_type) = match existing {
        Some(existing) => {
            let product = ProductRepo::overwrite(
                &state.pool,
                existing.id,
                name,
                &sku,
                &sku_normalized,
                description,
                active,
            )
            .await?
            .ok_or(AppError::Core(CoreError::NotFound {
                entity: "Product",
                id: existing.id,
            }))?;
            (product, WebhookEventType::ProductUpdated)
        }
        None => {
            let product =
                ProductRepo::insert(&state.pool, name, &sku, &sku_normalized, description, active)
                    .await?;
            (product, WebhookEventType::ProductCreated)
        }
    };

    tracing::info!(
        product_id = product.id,
        sku_normalized = %product.sku_normalized,
        event = %event_type,
        "Product written",
    );

    notify_product(&state, event_type, &product).await;
    Ok((StatusCode::CREATED, Json(DataResponse { data: product })))
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// PUT /api/v1/products/{id}
///
/// Partial update. Changing the SKU to one whose normalized form belongs to
/// another product is a 409. Emits `product.updated`.
pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<DbId>,
    Json(input): Json<UpdateProduct>,
) -> AppResult<impl IntoResponse> {
    ProductRepo::find_by_id(&state.pool, product_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Product",
            id: product_id,
        }))?;

    let sku_pair = match input.sku.as_deref() {
        Some(raw) => {
            let sku = trim_sku(raw);
            if sku.is_empty() {
                return Err(AppError::BadRequest("sku must not be empty".into()));
            }
            let normalized = normalize_sku(raw);
            let conflict =
                ProductRepo::find_sku_conflict(&state.pool, &normalized, product_id).await?;
            if conflict.is_some() {
                return Err(AppError::Core(CoreError::Conflict(
                    "SKU already exists".into(),
                )));
            }
            Some((sku, normalized))
        }
        None => None,
    };

    let product = ProductRepo::update(
        &state.pool,
        product_id,
        input.name.as_deref(),
        sku_pair
            .as_ref()
            .map(|(sku, normalized)| (sku.as_str(), normalized.as_str())),
        input.description.as_deref(),
        input.active,
    )
    .await?
    .ok_or(AppError::Core(CoreError::NotFound {
        entity: "Product",
        id: product_id,
    }))?;

    notify_product(&state, WebhookEventType::ProductUpdated, &product).await;
    Ok(Json(DataResponse { data: product }))
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// DELETE /api/v1/products/{id}
///
/// Emits `product.deleted` carrying the product's last representation.
pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let product = ProductRepo::find_by_id(&state.pool, product_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Product",
            id: product_id,
        }))?;

    ProductRepo::delete(&state.pool, product_id).await?;

    tracing::info!(product_id, "Product deleted");
    notify_product(&state, WebhookEventType::ProductDeleted, &product).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Response body for the bulk delete endpoint.
#[derive(Debug, Serialize)]
pub struct BulkDeleteResult {
    pub deleted: i64,
}

/// DELETE /api/v1/products/bulk
///
/// Deletes every product. Emits `bulk_delete.completed` only when at least
/// one row was removed.
pub async fn bulk_delete_products(
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let deleted = ProductRepo::delete_all(&state.pool).await?;

    if deleted > 0 {
        tracing::info!(deleted, "Bulk delete completed");
        state
            .notifier
            .notify(
                WebhookEventType::BulkDeleteCompleted,
                serde_json::json!({ "deleted": deleted }),
                None,
            )
            .await;
    }

    Ok(Json(DataResponse {
        data: BulkDeleteResult { deleted },
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn normalized_description(description: Option<&str>) -> Option<&str> {
    description
        .map(str::trim)
        .filter(|description| !description.is_empty())
}

async fn notify_product(state: &AppState, event_type: WebhookEventType, product: &Product) {
    match serde_json::to_value(product) {
        Ok(payload) => state.notifier.notify(event_type, payload, None).await,
        Err(e) => tracing::error!(
            product_id = product.id,
            error = %e,
            "Failed to serialize product for webhook payload",
        ),
    }
}
