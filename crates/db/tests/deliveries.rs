use sqlx::PgPool;
use stockpile_db::models::delivery::{
    NewDelivery, DELIVERY_STATUS_DELIVERED, DELIVERY_STATUS_FAILED, DELIVERY_STATUS_RETRYING,
};
use stockpile_db::repositories::{DeliveryRepo, WebhookRepo};

async fn seed_delivery(pool: &PgPool) -> stockpile_db::models::delivery::WebhookDelivery {
    let webhook = WebhookRepo::create(pool, "https://example.com/hook", "product.created", true)
        .await
        .unwrap();
    DeliveryRepo::enqueue(
        pool,
        &NewDelivery {
            webhook_id: webhook.id,
            event_type: "product.created".to_string(),
            payload: serde_json::json!({"id": 1}),
            url: webhook.url.clone(),
        },
    )
    .await
    .unwrap()
}

#[sqlx::test(migrations = "./migrations")]
async fn enqueued_delivery_is_due_immediately(pool: PgPool) {
    let delivery = seed_delivery(&pool).await;
    assert_eq!(delivery.status, "pending");
    assert_eq!(delivery.attempt_count, 0);

    let claimed = DeliveryRepo::claim_due(&pool, 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, delivery.id);
    assert_eq!(claimed[0].attempt_count, 1, "claim counts the attempt");
}

#[sqlx::test(migrations = "./migrations")]
async fn mark_delivered_finishes_the_delivery(pool: PgPool) {
    let delivery = seed_delivery(&pool).await;
    let claimed = DeliveryRepo::claim_due(&pool, 10).await.unwrap();
    DeliveryRepo::mark_delivered(&pool, claimed[0].id, 200)
        .await
        .unwrap();

    // Delivered rows are never claimed again.
    assert!(DeliveryRepo::claim_due(&pool, 10).await.unwrap().is_empty());

    let rows = DeliveryRepo::list_for_webhook(&pool, delivery.webhook_id, 10, 0)
        .await
        .unwrap();
    assert_eq!(rows[0].status, DELIVERY_STATUS_DELIVERED);
    assert_eq!(rows[0].response_status_code, Some(200));
    assert!(rows[0].delivered_at.is_some());
}

#[sqlx::test(migrations = "./migrations")]
async fn failed_attempts_retry_until_budget_is_spent(pool: PgPool) {
    let delivery = seed_delivery(&pool).await;

    // Attempts 1 and 2 fail: rescheduled as retrying.
    for _ in 0..2 {
        let claimed = DeliveryRepo::claim_due(&pool, 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        let status = DeliveryRepo::record_failure(&pool, claimed[0].id, Some(500), 0)
            .await
            .unwrap();
        assert_eq!(status, DELIVERY_STATUS_RETRYING);
    }

    // Attempt 3 fails: budget of 3 exhausted, delivery dropped.
    let claimed = DeliveryRepo::claim_due(&pool, 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].attempt_count, 3);
    let status = DeliveryRepo::record_failure(&pool, claimed[0].id, Some(500), 0)
        .await
        .unwrap();
    assert_eq!(status, DELIVERY_STATUS_FAILED);

    assert!(DeliveryRepo::claim_due(&pool, 10).await.unwrap().is_empty());

    let rows = DeliveryRepo::list_for_webhook(&pool, delivery.webhook_id, 10, 0)
        .await
        .unwrap();
    assert_eq!(rows[0].status, DELIVERY_STATUS_FAILED);
}

#[sqlx::test(migrations = "./migrations")]
async fn retry_with_backoff_is_not_due_until_scheduled(pool: PgPool) {
    seed_delivery(&pool).await;

    let claimed = DeliveryRepo::claim_due(&pool, 10).await.unwrap();
    DeliveryRepo::record_failure(&pool, claimed[0].id, None, 300)
        .await
        .unwrap();

    // Scheduled five minutes out: nothing is due now.
    assert!(DeliveryRepo::claim_due(&pool, 10).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_a_webhook_cascades_to_its_deliveries(pool: PgPool) {
    let delivery = seed_delivery(&pool).await;
    WebhookRepo::delete(&pool, delivery.webhook_id).await.unwrap();
    assert!(DeliveryRepo::claim_due(&pool, 10).await.unwrap().is_empty());
}
