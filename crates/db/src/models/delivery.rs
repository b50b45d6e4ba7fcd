//! Webhook delivery queue models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stockpile_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Status values
// ---------------------------------------------------------------------------

pub const DELIVERY_STATUS_PENDING: &str = "pending";
pub const DELIVERY_STATUS_RETRYING: &str = "retrying";
pub const DELIVERY_STATUS_DELIVERED: &str = "delivered";
pub const DELIVERY_STATUS_FAILED: &str = "failed";

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `webhook_deliveries` table.
///
/// One independent delivery unit per resolved subscriber per event. The URL
/// is captured at enqueue time so later subscription edits do not reroute
/// in-flight deliveries.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: DbId,
    pub webhook_id: DbId,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub url: String,
    pub status: String,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub next_attempt_at: Option<Timestamp>,
    pub response_status_code: Option<i16>,
    pub delivered_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// Input for enqueueing one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDelivery {
    pub webhook_id: DbId,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub url: String,
}
