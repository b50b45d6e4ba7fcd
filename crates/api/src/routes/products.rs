//! Route definitions for products.
//!
//! Mounted at `/products`.

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::imports::UPLOAD_BODY_LIMIT_BYTES;
use crate::handlers::{imports, products};
use crate::state::AppState;

/// Routes mounted at `/products`.
///
/// ```text
/// GET    /          -> list_products
/// POST   /          -> create_product
/// POST   /upload    -> upload_products   (multipart, 202)
/// DELETE /bulk      -> bulk_delete_products
/// GET    /{id}      -> get_product
/// PUT    /{id}      -> update_product
/// DELETE /{id}      -> delete_product
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/upload",
            post(imports::upload_products).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT_BYTES)),
        )
        .route("/bulk", delete(products::bulk_delete_products))
        .route(
            "/{id}",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
}
