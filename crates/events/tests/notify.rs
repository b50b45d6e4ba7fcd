use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::PgPool;
use stockpile_core::events::WebhookEventType;
use stockpile_db::models::delivery::NewDelivery;
use stockpile_db::repositories::WebhookRepo;
use stockpile_events::{DeliveryQueue, WebhookNotifier};

/// Records enqueued deliveries instead of writing queue rows.
#[derive(Default)]
struct RecordingQueue {
    deliveries: Arc<Mutex<Vec<NewDelivery>>>,
}

impl RecordingQueue {
    fn handle(&self) -> Arc<Mutex<Vec<NewDelivery>>> {
        Arc::clone(&self.deliveries)
    }
}

#[async_trait]
impl DeliveryQueue for RecordingQueue {
    async fn enqueue(&self, delivery: NewDelivery) -> Result<(), sqlx::Error> {
        self.deliveries
            .lock()
            .expect("recording queue lock poisoned")
            .push(delivery);
        Ok(())
    }
}

/// Rejects every enqueue, to prove failures never reach the caller.
struct FailingQueue;

#[async_trait]
impl DeliveryQueue for FailingQueue {
    async fn enqueue(&self, _delivery: NewDelivery) -> Result<(), sqlx::Error> {
        Err(sqlx::Error::PoolClosed)
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn notify_targets_enabled_webhooks_matching_event_type(pool: PgPool) {
    WebhookRepo::create(&pool, "https://example.com/a", "product.created", true)
        .await
        .unwrap();
    WebhookRepo::create(&pool, "https://example.com/b", "product.created", false)
        .await
        .unwrap();
    WebhookRepo::create(&pool, "https://example.com/c", "product.updated", true)
        .await
        .unwrap();

    let queue = RecordingQueue::default();
    let recorded = queue.handle();
    let notifier = WebhookNotifier::new(pool, Box::new(queue));

    notifier
        .notify(
            WebhookEventType::ProductCreated,
            serde_json::json!({"product_id": 1}),
            None,
        )
        .await;

    let deliveries = recorded.lock().unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].url, "https://example.com/a");
    assert_eq!(deliveries[0].event_type, "product.created");
    assert_eq!(deliveries[0].payload, serde_json::json!({"product_id": 1}));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn notify_respects_explicit_id_set(pool: PgPool) {
    WebhookRepo::create(&pool, "https://example.com/a", "product.created", true)
        .await
        .unwrap();
    let b = WebhookRepo::create(&pool, "https://example.com/b", "product.created", true)
        .await
        .unwrap();

    let queue = RecordingQueue::default();
    let recorded = queue.handle();
    let notifier = WebhookNotifier::new(pool, Box::new(queue));

    notifier
        .notify(
            WebhookEventType::ProductCreated,
            serde_json::json!({"product_id": 42}),
            Some(&[b.id]),
        )
        .await;

    let deliveries = recorded.lock().unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].webhook_id, b.id);
    assert_eq!(deliveries[0].url, "https://example.com/b");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn notify_explicit_ids_still_require_enabled(pool: PgPool) {
    let disabled = WebhookRepo::create(&pool, "https://example.com/off", "import.completed", false)
        .await
        .unwrap();

    let queue = RecordingQueue::default();
    let recorded = queue.handle();
    let notifier = WebhookNotifier::new(pool, Box::new(queue));

    notifier
        .notify(
            WebhookEventType::ImportCompleted,
            serde_json::json!({}),
            Some(&[disabled.id]),
        )
        .await;

    assert!(recorded.lock().unwrap().is_empty());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn notify_with_no_subscribers_is_a_noop(pool: PgPool) {
    let queue = RecordingQueue::default();
    let recorded = queue.handle();
    let notifier = WebhookNotifier::new(pool, Box::new(queue));

    notifier
        .notify(WebhookEventType::ImportFailed, serde_json::json!({}), None)
        .await;

    assert!(recorded.lock().unwrap().is_empty());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn enqueue_failures_never_reach_the_caller(pool: PgPool) {
    WebhookRepo::create(&pool, "https://example.com/a", "product.deleted", true)
        .await
        .unwrap();

    let notifier = WebhookNotifier::new(pool, Box::new(FailingQueue));

    // Must return normally despite the queue rejecting the delivery.
    notifier
        .notify(
            WebhookEventType::ProductDeleted,
            serde_json::json!({"id": 9}),
            None,
        )
        .await;
}
