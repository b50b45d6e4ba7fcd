use std::sync::Arc;

use stockpile_cache::ProgressStore;
use stockpile_events::WebhookNotifier;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already
/// `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: stockpile_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Ephemeral progress store read by the progress stream.
    pub progress: Arc<dyn ProgressStore>,
    /// Webhook fan-out used by the mutating product endpoints.
    pub notifier: Arc<WebhookNotifier>,
}
