//! Webhook delivery runner.
//!
//! Claims due deliveries in batches and POSTs them concurrently:
//! deliveries are independent side effects with no ordering guarantee
//! between them. Failed attempts are rescheduled on the row with
//! exponential backoff until the attempt budget is spent, then dropped.

use std::time::Duration;

use futures::future::join_all;
use stockpile_db::models::delivery::{WebhookDelivery, DELIVERY_STATUS_FAILED};
use stockpile_db::repositories::DeliveryRepo;
use stockpile_db::DbPool;
use stockpile_events::{backoff_delay_secs, WebhookSender};
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;

/// Long-lived task that drains the webhook delivery queue.
pub struct DeliveryRunner {
    pool: DbPool,
    sender: WebhookSender,
    poll_interval: Duration,
    batch_size: i64,
}

impl DeliveryRunner {
    pub fn new(pool: DbPool, sender: WebhookSender, config: &WorkerConfig) -> Self {
        Self {
            pool,
            sender,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            batch_size: config.delivery_batch_size,
        }
    }

    /// Run the poll loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            batch_size = self.batch_size,
            "Delivery runner started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Delivery runner shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.try_deliver().await {
                        tracing::error!(error = %e, "Delivery cycle failed");
                    }
                }
            }
        }
    }

    /// One cycle: claim due deliveries and attempt them concurrently.
    async fn try_deliver(&self) -> Result<(), sqlx::Error> {
        let due = DeliveryRepo::claim_due(&self.pool, self.batch_size).await?;
        if due.is_empty() {
            return Ok(());
        }

        join_all(due.iter().map(|delivery| self.attempt(delivery))).await;
        Ok(())
    }

    /// One delivery attempt, with its own bookkeeping on the queue row.
    async fn attempt(&self, delivery: &WebhookDelivery) {
        let started = std::time::Instant::now();
        let result = self
            .sender
            .send(&delivery.url, &delivery.event_type, &delivery.payload)
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(status_code) => {
                tracing::info!(
                    delivery_id = delivery.id,
                    url = %delivery.url,
                    status_code,
                    duration_ms,
                    "Webhook delivered",
                );
                if let Err(e) =
                    DeliveryRepo::mark_delivered(&self.pool, delivery.id, status_code as i16).await
                {
                    tracing::error!(
                        delivery_id = delivery.id,
                        error = %e,
                        "Failed to mark delivery as delivered",
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    delivery_id = delivery.id,
                    url = %delivery.url,
                    attempt = delivery.attempt_count,
                    duration_ms,
                    error = %e,
                    "Webhook delivery attempt failed",
                );
                let delay = backoff_delay_secs(delivery.attempt_count);
                match DeliveryRepo::record_failure(
                    &self.pool,
                    delivery.id,
                    e.status_code(),
                    delay,
                )
                .await
                {
                    Ok(status) if status == DELIVERY_STATUS_FAILED => {
                        // Retries exhausted: the delivery is dropped.
                        tracing::error!(
                            delivery_id = delivery.id,
                            url = %delivery.url,
                            attempts = delivery.attempt_count,
                            "Webhook delivery failed after all retries",
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(
                            delivery_id = delivery.id,
                            error = %e,
                            "Failed to record delivery failure",
                        );
                    }
                }
            }
        }
    }
}
