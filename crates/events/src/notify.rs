//! Webhook fan-out.
//!
//! [`WebhookNotifier::notify`] resolves the target subscriber set for an
//! event and hands one delivery per subscriber to a [`DeliveryQueue`].
//! Notification is always best-effort relative to the mutating operation
//! that triggered it: resolution and enqueue failures are logged, never
//! surfaced to the caller.

use async_trait::async_trait;
use stockpile_core::events::WebhookEventType;
use stockpile_core::types::DbId;
use stockpile_db::models::delivery::NewDelivery;
use stockpile_db::models::webhook::Webhook;
use stockpile_db::repositories::{DeliveryRepo, WebhookRepo};
use stockpile_db::DbPool;

// ---------------------------------------------------------------------------
// DeliveryQueue seam
// ---------------------------------------------------------------------------

/// Destination for resolved deliveries.
///
/// Injected at construction so the notifier never reaches into a concrete
/// task layer; tests substitute a recording queue.
#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    async fn enqueue(&self, delivery: NewDelivery) -> Result<(), sqlx::Error>;
}

/// Production queue: one row per delivery in `webhook_deliveries`.
pub struct PgDeliveryQueue {
    pool: DbPool,
}

impl PgDeliveryQueue {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryQueue for PgDeliveryQueue {
    async fn enqueue(&self, delivery: NewDelivery) -> Result<(), sqlx::Error> {
        DeliveryRepo::enqueue(&self.pool, &delivery).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// WebhookNotifier
// ---------------------------------------------------------------------------

/// Resolves subscribers and fans an event out to the delivery queue.
pub struct WebhookNotifier {
    pool: DbPool,
    queue: Box<dyn DeliveryQueue>,
}

impl WebhookNotifier {
    /// Build a notifier with an explicit delivery queue.
    pub fn new(pool: DbPool, queue: Box<dyn DeliveryQueue>) -> Self {
        Self { pool, queue }
    }

    /// Build the production notifier backed by the `webhook_deliveries`
    /// table on the same pool.
    pub fn postgres(pool: DbPool) -> Self {
        let queue = Box::new(PgDeliveryQueue::new(pool.clone()));
        Self::new(pool, queue)
    }

    /// Schedule webhook deliveries for the given event payload.
    ///
    /// With `webhook_ids`, the target set is restricted to those ids that
    /// are enabled; otherwise every enabled subscriber matching the event
    /// type is targeted. No match is a no-op, not an error.
    pub async fn notify(
        &self,
        event_type: WebhookEventType,
        payload: serde_json::Value,
        webhook_ids: Option<&[DbId]>,
    ) {
        let webhooks = match self.resolve(event_type, webhook_ids).await {
            Ok(webhooks) => webhooks,
            Err(e) => {
                tracing::error!(
                    event_type = %event_type,
                    error = %e,
                    "Failed to resolve webhook subscribers",
                );
                return;
            }
        };

        for webhook in webhooks {
            let delivery = NewDelivery {
                webhook_id: webhook.id,
                event_type: event_type.as_str().to_string(),
                payload: payload.clone(),
                url: webhook.url.clone(),
            };
            if let Err(e) = self.queue.enqueue(delivery).await {
                tracing::error!(
                    webhook_id = webhook.id,
                    url = %webhook.url,
                    event_type = %event_type,
                    error = %e,
                    "Failed to enqueue webhook delivery",
                );
            }
        }
    }

    async fn resolve(
        &self,
        event_type: WebhookEventType,
        webhook_ids: Option<&[DbId]>,
    ) -> Result<Vec<Webhook>, sqlx::Error> {
        match webhook_ids {
            Some(ids) if !ids.is_empty() => {
                WebhookRepo::list_enabled_by_ids(&self.pool, ids).await
            }
            _ => WebhookRepo::list_enabled_for_event(&self.pool, event_type.as_str()).await,
        }
    }
}
