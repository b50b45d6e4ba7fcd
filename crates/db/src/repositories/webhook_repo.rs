//! Repository for the `webhooks` table.

use sqlx::PgPool;
use stockpile_core::types::DbId;

use crate::models::webhook::Webhook;

// ---------------------------------------------------------------------------
// Column list
// ---------------------------------------------------------------------------

const COLUMNS: &str = "id, url, event_type, enabled, created_at, updated_at";

/// Provides CRUD and dispatcher-resolution queries for webhooks.
pub struct WebhookRepo;

impl WebhookRepo {
    // -----------------------------------------------------------------------
    // CRUD
    // -----------------------------------------------------------------------

    /// Create a new webhook subscription.
    pub async fn create(
        pool: &PgPool,
        url: &str,
        event_type: &str,
        enabled: bool,
    ) -> Result<Webhook, sqlx::Error> {
        let query = format!(
            "INSERT INTO webhooks (url, event_type, enabled) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Webhook>(&query)
            .bind(url)
            .bind(event_type)
            .bind(enabled)
            .fetch_one(pool)
            .await
    }

    /// List all webhooks, oldest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Webhook>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM webhooks ORDER BY created_at ASC");
        sqlx::query_as::<_, Webhook>(&query).fetch_all(pool).await
    }

    /// Find a webhook by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Webhook>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM webhooks WHERE id = $1");
        sqlx::query_as::<_, Webhook>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Update a webhook's settings.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        url: Option<&str>,
        event_type: Option<&str>,
        enabled: Option<bool>,
    ) -> Result<Option<Webhook>, sqlx::Error> {
        let query = format!(
            "UPDATE webhooks SET \
                 url = COALESCE($2, url), \
                 event_type = COALESCE($3, event_type), \
                 enabled = COALESCE($4, enabled), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Webhook>(&query)
            .bind(id)
            .bind(url)
            .bind(event_type)
            .bind(enabled)
            .fetch_optional(pool)
            .await
    }

    /// Delete a webhook by ID. Cascade deletes its queued deliveries.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM webhooks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Dispatcher resolution
    // -----------------------------------------------------------------------

    /// All enabled webhooks subscribed to the given event type.
    pub async fn list_enabled_for_event(
        pool: &PgPool,
        event_type: &str,
    ) -> Result<Vec<Webhook>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM webhooks \
             WHERE event_type = $1 AND enabled = TRUE \
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, Webhook>(&query)
            .bind(event_type)
            .fetch_all(pool)
            .await
    }

    /// The enabled subset of an explicit webhook id list.
    pub async fn list_enabled_by_ids(
        pool: &PgPool,
        ids: &[DbId],
    ) -> Result<Vec<Webhook>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM webhooks \
             WHERE id = ANY($1) AND enabled = TRUE \
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, Webhook>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }
}
