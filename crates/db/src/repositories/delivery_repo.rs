//! Repository for the `webhook_deliveries` queue table.
//!
//! Retry scheduling is durable: attempt counts and next-attempt times live
//! on the row, so a worker crash between attempts cannot lose a delivery.

use sqlx::PgPool;
use stockpile_core::types::DbId;

use crate::models::delivery::{NewDelivery, WebhookDelivery};

// ---------------------------------------------------------------------------
// Column list
// ---------------------------------------------------------------------------

const COLUMNS: &str = "\
    id, webhook_id, event_type, payload, url, status, attempt_count, \
    max_attempts, next_attempt_at, response_status_code, delivered_at, \
    created_at, updated_at";

/// Provides queue operations for webhook deliveries.
pub struct DeliveryRepo;

impl DeliveryRepo {
    /// Enqueue one delivery (status `pending`, due immediately).
    pub async fn enqueue(
        pool: &PgPool,
        delivery: &NewDelivery,
    ) -> Result<WebhookDelivery, sqlx::Error> {
        let query = format!(
            "INSERT INTO webhook_deliveries (webhook_id, event_type, payload, url) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WebhookDelivery>(&query)
            .bind(delivery.webhook_id)
            .bind(&delivery.event_type)
            .bind(&delivery.payload)
            .bind(&delivery.url)
            .fetch_one(pool)
            .await
    }

    /// Claim up to `limit` due deliveries, incrementing their attempt count.
    ///
    /// A delivery is due when pending/retrying, past its retry time, and
    /// under its attempt budget. `FOR UPDATE SKIP LOCKED` keeps concurrent
    /// workers off the same rows. The returned `attempt_count` is the
    /// 1-based number of the attempt being made now.
    pub async fn claim_due(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>, sqlx::Error> {
        let query = format!(
            "UPDATE webhook_deliveries \
             SET attempt_count = attempt_count + 1, updated_at = NOW() \
             WHERE id IN ( \
                 SELECT id FROM webhook_deliveries \
                 WHERE status IN ('pending', 'retrying') \
                   AND (next_attempt_at IS NULL OR next_attempt_at <= NOW()) \
                   AND attempt_count < max_attempts \
                 ORDER BY created_at ASC \
                 LIMIT $1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WebhookDelivery>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Mark a delivery as successfully delivered.
    pub async fn mark_delivered(
        pool: &PgPool,
        id: DbId,
        response_status_code: i16,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE webhook_deliveries \
             SET status = 'delivered', response_status_code = $2, \
                 delivered_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(response_status_code)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record a failed attempt: schedule a retry with the given delay, or
    /// terminally fail the delivery once the attempt budget is spent.
    /// Returns the resulting status.
    pub async fn record_failure(
        pool: &PgPool,
        id: DbId,
        response_status_code: Option<i16>,
        retry_delay_secs: i64,
    ) -> Result<String, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE webhook_deliveries \
             SET status = CASE WHEN attempt_count >= max_attempts \
                               THEN 'failed' ELSE 'retrying' END, \
                 response_status_code = $2, \
                 next_attempt_at = NOW() + ($3 || ' seconds')::INTERVAL, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING status",
        )
        .bind(id)
        .bind(response_status_code)
        .bind(retry_delay_secs.to_string())
        .fetch_one(pool)
        .await
    }

    /// List deliveries for a webhook, newest first.
    pub async fn list_for_webhook(
        pool: &PgPool,
        webhook_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WebhookDelivery>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM webhook_deliveries \
             WHERE webhook_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, WebhookDelivery>(&query)
            .bind(webhook_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
