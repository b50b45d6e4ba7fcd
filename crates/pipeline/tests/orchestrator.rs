//! End-to-end pipeline tests: a staged CSV file in, products, job state,
//! and queued webhook deliveries out.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use sqlx::PgPool;
use stockpile_cache::{MemoryProgressStore, ProgressStore};
use stockpile_core::status::ImportJobStatus;
use stockpile_db::models::import_job::CreateImportJob;
use stockpile_db::models::product::ProductFilter;
use stockpile_db::repositories::{DeliveryRepo, ImportJobRepo, ProductRepo, WebhookRepo};
use stockpile_events::WebhookNotifier;
use stockpile_pipeline::{ImportOrchestrator, ImportOutcome};
use tempfile::TempDir;
use uuid::Uuid;

struct Harness {
    orchestrator: ImportOrchestrator,
    progress: Arc<MemoryProgressStore>,
    dir: TempDir,
}

fn harness(pool: &PgPool) -> Harness {
    let progress = Arc::new(MemoryProgressStore::new());
    let notifier = Arc::new(WebhookNotifier::postgres(pool.clone()));
    Harness {
        orchestrator: ImportOrchestrator::new(
            pool.clone(),
            Arc::clone(&progress) as Arc<dyn ProgressStore>,
            notifier,
        ),
        progress,
        dir: TempDir::new().expect("tempdir"),
    }
}

impl Harness {
    fn stage_csv(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("create csv");
        file.write_all(content.as_bytes()).expect("write csv");
        path
    }

    async fn create_job(&self, pool: &PgPool, file_path: &str) -> Uuid {
        let id = Uuid::new_v4();
        ImportJobRepo::create(
            pool,
            id,
            &CreateImportJob {
                file_path: file_path.to_string(),
                original_filename: Some("products.csv".to_string()),
                content_type: Some("text/csv".to_string()),
            },
        )
        .await
        .expect("create job");
        id
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn valid_csv_completes_with_products_and_events(pool: PgPool) {
    let created_hook = WebhookRepo::create(&pool, "https://example.com/c", "product.created", true)
        .await
        .unwrap();
    let done_hook = WebhookRepo::create(&pool, "https://example.com/d", "import.completed", true)
        .await
        .unwrap();

    let h = harness(&pool);
    let path = h.stage_csv(
        "products.csv",
        "name,sku,description\nWidget,SKU-1,Example\nGadget,SKU-2,Example\n",
    );
    let job_id = h.create_job(&pool, path.to_str().unwrap()).await;

    let outcome = h.orchestrator.run(job_id).await;
    assert_eq!(
        outcome,
        ImportOutcome::Completed {
            processed: 2,
            total: 2
        }
    );

    // Job row reached its terminal state.
    let job = ImportJobRepo::find_by_id(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, ImportJobStatus::Completed.as_str());
    assert_eq!(job.progress, 100);
    assert_eq!(job.processed_records, 2);
    assert_eq!(job.total_records, Some(2));
    assert_eq!(job.file_path, None, "upload reference cleared");
    assert!(!path.exists(), "staged file removed");

    // Both products exist under their normalized SKUs.
    for sku in ["sku-1", "sku-2"] {
        assert!(ProductRepo::find_by_normalized_sku(&pool, sku)
            .await
            .unwrap()
            .is_some());
    }

    // One product.created delivery per product, then one import.completed.
    let created = DeliveryRepo::list_for_webhook(&pool, created_hook.id, 10, 0)
        .await
        .unwrap();
    assert_eq!(created.len(), 2);

    let completed = DeliveryRepo::list_for_webhook(&pool, done_hook.id, 10, 0)
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].payload["processed_records"], 2);
    assert_eq!(completed[0].payload["total_records"], 2);
    assert_eq!(completed[0].payload["job_id"], job_id.to_string());

    // The completed snapshot was held briefly and then cleared.
    assert!(h.progress.read(&job_id.to_string()).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn reimport_updates_existing_product_in_place(pool: PgPool) {
    let updated_hook = WebhookRepo::create(&pool, "https://example.com/u", "product.updated", true)
        .await
        .unwrap();

    let h = harness(&pool);
    let first = h.stage_csv(
        "first.csv",
        "name,sku,description\nWidget,SKU-1,Example\n",
    );
    let job = h.create_job(&pool, first.to_str().unwrap()).await;
    h.orchestrator.run(job).await;

    let original = ProductRepo::find_by_normalized_sku(&pool, "sku-1")
        .await
        .unwrap()
        .unwrap();

    let second = h.stage_csv(
        "second.csv",
        "name,sku,description\nNew Widget,SKU-1,New desc\n",
    );
    let job = h.create_job(&pool, second.to_str().unwrap()).await;
    let outcome = h.orchestrator.run(job).await;
    assert!(matches!(outcome, ImportOutcome::Completed { .. }));

    let reimported = ProductRepo::find_by_normalized_sku(&pool, "sku-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reimported.id, original.id, "identity survives re-import");
    assert_eq!(reimported.name, "New Widget");
    assert_eq!(reimported.description.as_deref(), Some("New desc"));

    let updates = DeliveryRepo::list_for_webhook(&pool, updated_hook.id, 10, 0)
        .await
        .unwrap();
    assert_eq!(updates.len(), 1, "second import classifies as updated");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn duplicate_skus_in_one_window_collapse_last_wins(pool: PgPool) {
    let h = harness(&pool);
    let path = h.stage_csv(
        "dupes.csv",
        "name,sku,description\nA,SKU-1,first\nB,sku-1,second\n",
    );
    let job_id = h.create_job(&pool, path.to_str().unwrap()).await;

    let outcome = h.orchestrator.run(job_id).await;
    assert_eq!(
        outcome,
        ImportOutcome::Completed {
            processed: 2,
            total: 2
        }
    );

    let (products, total) = ProductRepo::list(&pool, &ProductFilter::default(), 25, 0)
        .await
        .unwrap();
    assert_eq!(total, 1, "exactly one row for the duplicated key");
    assert_eq!(products[0].name, "B");
    assert_eq!(products[0].sku_normalized, "sku-1");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn missing_required_column_fails_without_products(pool: PgPool) {
    let failed_hook = WebhookRepo::create(&pool, "https://example.com/f", "import.failed", true)
        .await
        .unwrap();

    let h = harness(&pool);
    let path = h.stage_csv("bad.csv", "name,description\nWidget,Example\n");
    let job_id = h.create_job(&pool, path.to_str().unwrap()).await;

    let outcome = h.orchestrator.run(job_id).await;
    let ImportOutcome::TerminalFailure(message) = outcome else {
        panic!("expected terminal failure, got {outcome:?}");
    };
    assert!(message.contains("sku"), "message names the missing column");

    let job = ImportJobRepo::find_by_id(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, ImportJobStatus::Failed.as_str());
    assert_eq!(job.error_message.as_deref(), Some(message.as_str()));
    assert!(!path.exists(), "staged file removed on failure too");

    let (_, total) = ProductRepo::list(&pool, &ProductFilter::default(), 25, 0)
        .await
        .unwrap();
    assert_eq!(total, 0, "no products from a rejected file");

    let failures = DeliveryRepo::list_for_webhook(&pool, failed_hook.id, 10, 0)
        .await
        .unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].payload["message"], message);

    // Failure clears the snapshot immediately.
    assert!(h.progress.read(&job_id.to_string()).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn empty_name_in_first_batch_commits_nothing(pool: PgPool) {
    let h = harness(&pool);
    let path = h.stage_csv(
        "bad-row.csv",
        "name,sku,description\n,SKU-1,Example\nGadget,SKU-2,Example\n",
    );
    let job_id = h.create_job(&pool, path.to_str().unwrap()).await;

    let outcome = h.orchestrator.run(job_id).await;
    let ImportOutcome::TerminalFailure(message) = outcome else {
        panic!("expected terminal failure, got {outcome:?}");
    };
    assert!(message.contains("non-empty 'name' and 'sku'"));

    let job = ImportJobRepo::find_by_id(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, ImportJobStatus::Failed.as_str());

    let (_, total) = ProductRepo::list(&pool, &ProductFilter::default(), 25, 0)
        .await
        .unwrap();
    assert_eq!(total, 0, "bad row in the first batch blocks the whole batch");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn missing_upload_reference_is_terminal(pool: PgPool) {
    let h = harness(&pool);
    let job_id = h.create_job(&pool, "/tmp/placeholder.csv").await;
    ImportJobRepo::clear_file_path(&pool, job_id).await.unwrap();

    let outcome = h.orchestrator.run(job_id).await;
    assert_eq!(
        outcome,
        ImportOutcome::TerminalFailure("Upload reference missing; cannot process.".to_string())
    );

    let job = ImportJobRepo::find_by_id(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, ImportJobStatus::Failed.as_str());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn vanished_file_on_disk_is_a_validation_failure(pool: PgPool) {
    let h = harness(&pool);
    let job_id = h.create_job(&pool, "/tmp/never-staged.csv").await;

    let outcome = h.orchestrator.run(job_id).await;
    let ImportOutcome::TerminalFailure(message) = outcome else {
        panic!("expected terminal failure, got {outcome:?}");
    };
    assert!(message.contains("no longer exists"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn rerunning_identical_content_creates_no_duplicates(pool: PgPool) {
    let h = harness(&pool);
    let content = "name,sku,description\nWidget,SKU-1,Example\nGadget,SKU-2,Example\n";

    let first = h.stage_csv("run1.csv", content);
    let job = h.create_job(&pool, first.to_str().unwrap()).await;
    h.orchestrator.run(job).await;

    let second = h.stage_csv("run2.csv", content);
    let job = h.create_job(&pool, second.to_str().unwrap()).await;
    let outcome = h.orchestrator.run(job).await;
    assert!(matches!(outcome, ImportOutcome::Completed { .. }));

    let (_, total) = ProductRepo::list(&pool, &ProductFilter::default(), 25, 0)
        .await
        .unwrap();
    assert_eq!(total, 2, "same normalized-SKU set after replay");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn small_batch_windows_keep_progress_monotonic(pool: PgPool) {
    let h = harness(&pool);
    let orchestrator = ImportOrchestrator::new(
        pool.clone(),
        Arc::new(MemoryProgressStore::new()),
        Arc::new(WebhookNotifier::postgres(pool.clone())),
    )
    .with_batch_size(2);

    let path = h.stage_csv(
        "batched.csv",
        "name,sku,description\nA,SKU-1,x\nB,SKU-2,x\nC,SKU-3,x\nD,SKU-4,x\nE,SKU-5,x\n",
    );
    let job_id = h.create_job(&pool, path.to_str().unwrap()).await;

    let outcome = orchestrator.run(job_id).await;
    assert_eq!(
        outcome,
        ImportOutcome::Completed {
            processed: 5,
            total: 5
        }
    );

    let job = ImportJobRepo::find_by_id(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(job.progress, 100);
    assert_eq!(job.processed_records, 5);

    let (_, total) = ProductRepo::list(&pool, &ProductFilter::default(), 25, 0)
        .await
        .unwrap();
    assert_eq!(total, 5);
}
