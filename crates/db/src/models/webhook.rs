//! Webhook subscription models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stockpile_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A webhook row from the `webhooks` table.
///
/// Each webhook subscribes to exactly one event type; the dispatcher reads
/// these rows at fan-out time, filtered to `enabled = true`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Webhook {
    pub id: DbId,
    pub url: String,
    pub event_type: String,
    pub enabled: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// Input for creating a new webhook subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWebhook {
    pub url: String,
    pub event_type: String,
    pub enabled: Option<bool>,
}

// ---------------------------------------------------------------------------
// Update DTO
// ---------------------------------------------------------------------------

/// Input for updating a webhook. All fields are optional.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateWebhook {
    pub url: Option<String>,
    pub event_type: Option<String>,
    pub enabled: Option<bool>,
}
