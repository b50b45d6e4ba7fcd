//! Handlers for webhook subscription management.
//!
//! Provides CRUD plus a synchronous test delivery to verify connectivity.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use stockpile_core::error::CoreError;
use stockpile_core::events::{WebhookEventType, EVENT_WEBHOOK_TEST};
use stockpile_core::types::DbId;
use stockpile_db::models::webhook::{CreateWebhook, UpdateWebhook};
use stockpile_db::repositories::WebhookRepo;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Timeout for one synchronous test delivery.
const TEST_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// GET /api/v1/webhooks
pub async fn list_webhooks(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let webhooks = WebhookRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: webhooks }))
}

/// POST /api/v1/webhooks
///
/// Create a new webhook subscription for a single event type.
pub async fn create_webhook(
    State(state): State<AppState>,
    Json(input): Json<CreateWebhook>,
) -> AppResult<impl IntoResponse> {
    let url = input.url.trim();
    if url.is_empty() {
        return Err(AppError::BadRequest("url must not be empty".into()));
    }
    let event_type = parse_event_type(&input.event_type)?;

    let webhook = WebhookRepo::create(
        &state.pool,
        url,
        event_type.as_str(),
        input.enabled.unwrap_or(true),
    )
    .await?;

    tracing::info!(
        webhook_id = webhook.id,
        url = %webhook.url,
        event_type = %webhook.event_type,
        "Webhook created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: webhook })))
}

/// PUT /api/v1/webhooks/{id}
///
/// Update a webhook's URL, event type, or enabled flag.
pub async fn update_webhook(
    State(state): State<AppState>,
    Path(webhook_id): Path<DbId>,
    Json(input): Json<UpdateWebhook>,
) -> AppResult<impl IntoResponse> {
    let event_type = input
        .event_type
        .as_deref()
        .map(parse_event_type)
        .transpose()?;

    let updated = WebhookRepo::update(
        &state.pool,
        webhook_id,
        input.url.as_deref().map(str::trim),
        event_type.map(|event_type| event_type.as_str()),
        input.enabled,
    )
    .await?
    .ok_or(AppError::Core(CoreError::NotFound {
        entity: "Webhook",
        id: webhook_id,
    }))?;

    tracing::info!(webhook_id, "Webhook updated");
    Ok(Json(DataResponse { data: updated }))
}

/// DELETE /api/v1/webhooks/{id}
pub async fn delete_webhook(
    State(state): State<AppState>,
    Path(webhook_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let deleted = WebhookRepo::delete(&state.pool, webhook_id).await?;
    if !deleted {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Webhook",
            id: webhook_id,
        }));
    }

    tracing::info!(webhook_id, "Webhook deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Test delivery
// ---------------------------------------------------------------------------

/// Response body for the synchronous webhook test endpoint.
#[derive(Debug, Serialize)]
pub struct WebhookTestResult {
    pub status_code: u16,
    pub response_time_ms: u64,
    pub body: String,
}

/// POST /api/v1/webhooks/{id}/test
///
/// Send a synthetic payload to the webhook's URL and report the raw
/// outcome. A transport-level failure maps to 502.
pub async fn test_webhook(
    State(state): State<AppState>,
    Path(webhook_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let webhook = WebhookRepo::find_by_id(&state.pool, webhook_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Webhook",
            id: webhook_id,
        }))?;

    let payload = serde_json::json!({
        "event": EVENT_WEBHOOK_TEST,
        "data": { "message": "This is a test payload" },
    });

    let client = reqwest::Client::builder()
        .timeout(TEST_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {e}")))?;

    let started = std::time::Instant::now();
    let response = client
        .post(&webhook.url)
        .json(&payload)
        .send()
        .await
        .map_err(|e| AppError::BadGateway(format!("Request failed: {e}")))?;
    let response_time_ms = started.elapsed().as_millis() as u64;

    let status_code = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    Ok(Json(DataResponse {
        data: WebhookTestResult {
            status_code,
            response_time_ms,
            body,
        },
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_event_type(value: &str) -> Result<WebhookEventType, AppError> {
    WebhookEventType::parse(value)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown event type: {value}")))
}
