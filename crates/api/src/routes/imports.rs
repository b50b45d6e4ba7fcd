//! Route definitions for import jobs.
//!
//! Mounted at `/imports`.

use axum::routing::get;
use axum::Router;

use crate::handlers::{imports, progress};
use crate::state::AppState;

/// Routes mounted at `/imports`.
///
/// ```text
/// GET /{id}           -> get_import_job
/// GET /{id}/progress  -> stream_progress (SSE)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(imports::get_import_job))
        .route("/{id}/progress", get(progress::stream_progress))
}
