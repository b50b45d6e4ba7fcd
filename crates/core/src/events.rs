//! Webhook event vocabulary.
//!
//! The set of subscribable event types is closed: webhooks subscribe to
//! exactly one of these, and the dispatcher matches deliveries against the
//! subscription at fan-out time.

use serde::{Deserialize, Serialize};

/// Event name sent by the webhook test endpoint. Not subscribable.
pub const EVENT_WEBHOOK_TEST: &str = "webhook.test";

/// A subscribable webhook event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEventType {
    #[serde(rename = "product.created")]
    ProductCreated,
    #[serde(rename = "product.updated")]
    ProductUpdated,
    #[serde(rename = "product.deleted")]
    ProductDeleted,
    #[serde(rename = "import.completed")]
    ImportCompleted,
    #[serde(rename = "import.failed")]
    ImportFailed,
    #[serde(rename = "bulk_delete.completed")]
    BulkDeleteCompleted,
}

impl WebhookEventType {
    /// The wire/database representation of this event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductCreated => "product.created",
            Self::ProductUpdated => "product.updated",
            Self::ProductDeleted => "product.deleted",
            Self::ImportCompleted => "import.completed",
            Self::ImportFailed => "import.failed",
            Self::BulkDeleteCompleted => "bulk_delete.completed",
        }
    }

    /// Parse an event type string. Returns `None` for anything outside the
    /// closed set (including `webhook.test`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "product.created" => Some(Self::ProductCreated),
            "product.updated" => Some(Self::ProductUpdated),
            "product.deleted" => Some(Self::ProductDeleted),
            "import.completed" => Some(Self::ImportCompleted),
            "import.failed" => Some(Self::ImportFailed),
            "bulk_delete.completed" => Some(Self::BulkDeleteCompleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_event_types() {
        for event in [
            WebhookEventType::ProductCreated,
            WebhookEventType::ProductUpdated,
            WebhookEventType::ProductDeleted,
            WebhookEventType::ImportCompleted,
            WebhookEventType::ImportFailed,
            WebhookEventType::BulkDeleteCompleted,
        ] {
            assert_eq!(WebhookEventType::parse(event.as_str()), Some(event));
        }
    }

    #[test]
    fn test_test_event_is_not_subscribable() {
        assert_eq!(WebhookEventType::parse(EVENT_WEBHOOK_TEST), None);
    }

    #[test]
    fn test_unknown_event_rejected() {
        assert_eq!(WebhookEventType::parse("product.archived"), None);
        assert_eq!(WebhookEventType::parse(""), None);
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&WebhookEventType::ProductCreated).unwrap();
        assert_eq!(json, "\"product.created\"");
        let parsed: WebhookEventType = serde_json::from_str("\"bulk_delete.completed\"").unwrap();
        assert_eq!(parsed, WebhookEventType::BulkDeleteCompleted);
    }
}
