pub mod health;
pub mod imports;
pub mod products;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /products                 list, create
/// /products/upload          CSV upload (multipart) -> 202 + job
/// /products/bulk            bulk delete
/// /products/{id}            get, update, delete
///
/// /imports/{id}             import job read
/// /imports/{id}/progress    SSE progress stream
///
/// /webhooks                 list, create
/// /webhooks/{id}            update, delete
/// /webhooks/{id}/test       synchronous test delivery
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/products", products::router())
        .nest("/imports", imports::router())
        .nest("/webhooks", webhooks::router())
}
