//! Route definitions for webhook management.
//!
//! Mounted at `/webhooks`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// Routes mounted at `/webhooks`.
///
/// ```text
/// GET    /            -> list_webhooks
/// POST   /            -> create_webhook
/// PUT    /{id}        -> update_webhook
/// DELETE /{id}        -> delete_webhook
/// POST   /{id}/test   -> test_webhook
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(webhooks::list_webhooks).post(webhooks::create_webhook),
        )
        .route(
            "/{id}",
            axum::routing::put(webhooks::update_webhook).delete(webhooks::delete_webhook),
        )
        .route("/{id}/test", post(webhooks::test_webhook))
}
