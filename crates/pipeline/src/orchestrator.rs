//! Import job orchestrator.
//!
//! Drives one job through `processing` to a terminal status:
//!
//! 1. Lock the row, reset counters, clear any stale snapshot.
//! 2. Count rows in a full pre-pass (off the async scheduler).
//! 3. Stream deduplicated batches: existence pre-check, atomic upsert,
//!    progress advance by *raw* row count, per-product event fan-out,
//!    snapshot publish.
//! 4. Terminal bookkeeping: completion event + held snapshot, or failure
//!    event + immediate snapshot clear. The staged file is removed
//!    unconditionally either way.
//!
//! Re-running a job id is safe: upserts are keyed by normalized SKU and
//! counters reset on entry to `processing`.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use stockpile_cache::ProgressStore;
use stockpile_core::csv::{self, Batch, CsvError, DEFAULT_BATCH_SIZE};
use stockpile_core::events::WebhookEventType;
use stockpile_core::progress::{progress_percent, ProgressSnapshot};
use stockpile_core::status::ImportJobStatus;
use stockpile_db::repositories::{ImportJobRepo, ProductRepo};
use stockpile_db::DbPool;
use stockpile_events::WebhookNotifier;
use uuid::Uuid;

use crate::outcome::ImportOutcome;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Snapshot phase while the counting pre-pass runs.
const PHASE_COUNTING: &str = "counting";

/// Snapshot phase while batches are applied.
const PHASE_IMPORTING: &str = "importing";

/// How long the final completed snapshot stays visible for late readers
/// before it is cleared.
const COMPLETION_OBSERVE_DELAY: Duration = Duration::from_secs(2);

/// In-flight batches buffered between the blocking parser and the
/// orchestrator.
const BATCH_CHANNEL_CAPACITY: usize = 4;

/// Generic user-facing message for infrastructure faults during counting.
const MSG_UNEXPECTED_COUNTING: &str = "Unexpected error preparing import.";

/// Generic user-facing message for infrastructure faults during batching.
const MSG_UNEXPECTED_PROCESSING: &str = "Unexpected error processing CSV.";

/// Failure message for a job row with no staged upload.
const MSG_MISSING_UPLOAD: &str = "Upload reference missing; cannot process.";

// ---------------------------------------------------------------------------
// Internal batch error
// ---------------------------------------------------------------------------

enum BatchError {
    /// Bad input; terminal.
    Validation(String),
    /// Infrastructure fault; the run is retryable. Carries the cause.
    Transient(String),
}

impl BatchError {
    fn transient(cause: impl std::fmt::Display) -> Self {
        Self::Transient(cause.to_string())
    }
}

// ---------------------------------------------------------------------------
// ImportOrchestrator
// ---------------------------------------------------------------------------

/// Owns import-job row mutation while a job is processing.
pub struct ImportOrchestrator {
    pool: DbPool,
    progress: Arc<dyn ProgressStore>,
    notifier: Arc<WebhookNotifier>,
    batch_size: usize,
}

impl ImportOrchestrator {
    pub fn new(
        pool: DbPool,
        progress: Arc<dyn ProgressStore>,
        notifier: Arc<WebhookNotifier>,
    ) -> Self {
        Self {
            pool,
            progress,
            notifier,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Override the raw-row batch window (used by tests).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Process one import job to a terminal status.
    pub async fn run(&self, job_id: Uuid) -> ImportOutcome {
        tracing::info!(%job_id, "Import job received by worker");

        let job = match ImportJobRepo::begin_processing(&self.pool, job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                // Nothing meaningful to retry for a vanished job id.
                tracing::error!(%job_id, "Import job not found");
                return ImportOutcome::TerminalFailure("Import job not found".to_string());
            }
            Err(e) => {
                tracing::error!(%job_id, error = %e, "Failed to load import job");
                return ImportOutcome::Retryable(format!("Failed to load import job: {e}"));
            }
        };

        let Some(file_path) = job.file_path.clone() else {
            tracing::error!(%job_id, "Import job missing file path");
            return self.fail_terminal(job_id, None, MSG_MISSING_UPLOAD).await;
        };

        let job_key = job_id.to_string();

        // A retried invocation must not inherit the previous attempt's
        // snapshot.
        self.clear_snapshot(&job_key).await;
        self.publish(
            &job_key,
            &ProgressSnapshot {
                status: Some(ImportJobStatus::Processing),
                progress: Some(0),
                phase: Some(PHASE_COUNTING.to_string()),
                message: Some("Counting CSV rows".to_string()),
                ..Default::default()
            },
        )
        .await;

        tracing::info!(%job_id, file = %file_path, "Starting counting pass");
        let count_path = PathBuf::from(&file_path);
        let total = match tokio::task::spawn_blocking(move || csv::count_rows(&count_path)).await {
            Ok(Ok(total)) => total as i64,
            Ok(Err(e)) if e.is_validation() => {
                tracing::warn!(%job_id, error = %e, "CSV validation failed during counting");
                return self
                    .fail_terminal(job_id, Some(&file_path), &e.to_string())
                    .await;
            }
            Ok(Err(e)) => {
                tracing::error!(%job_id, error = %e, "Unexpected error counting rows");
                return self
                    .fail_retryable(job_id, Some(&file_path), MSG_UNEXPECTED_COUNTING, e)
                    .await;
            }
            Err(e) => {
                tracing::error!(%job_id, error = %e, "Counting task aborted");
                return self
                    .fail_retryable(job_id, Some(&file_path), MSG_UNEXPECTED_COUNTING, e)
                    .await;
            }
        };

        if let Err(e) = ImportJobRepo::set_total(&self.pool, job_id, total).await {
            return self
                .fail_retryable(job_id, Some(&file_path), MSG_UNEXPECTED_PROCESSING, e)
                .await;
        }
        tracing::info!(%job_id, total, "Counting completed, starting import");
        self.publish(
            &job_key,
            &ProgressSnapshot {
                status: Some(ImportJobStatus::Processing),
                progress: Some(0),
                total: Some(total),
                phase: Some(PHASE_IMPORTING.to_string()),
                message: Some("Starting import".to_string()),
                ..Default::default()
            },
        )
        .await;

        let processed = match self.import_batches(job_id, &job_key, &file_path, total).await {
            Ok(processed) => processed,
            Err(BatchError::Validation(message)) => {
                tracing::warn!(%job_id, error = %message, "CSV processing failed");
                return self.fail_terminal(job_id, Some(&file_path), &message).await;
            }
            Err(BatchError::Transient(cause)) => {
                tracing::error!(%job_id, error = %cause, "Unexpected error processing job");
                return self
                    .fail_retryable(job_id, Some(&file_path), MSG_UNEXPECTED_PROCESSING, cause)
                    .await;
            }
        };

        // Processing is over; the staged upload is gone regardless of what
        // the terminal bookkeeping below does.
        self.cleanup_file(job_id, &file_path).await;

        if let Err(e) = ImportJobRepo::complete(&self.pool, job_id).await {
            return self
                .fail_retryable(job_id, None, MSG_UNEXPECTED_PROCESSING, e)
                .await;
        }
        self.notifier
            .notify(
                WebhookEventType::ImportCompleted,
                serde_json::json!({
                    "job_id": job_key.clone(),
                    "processed_records": processed,
                    "total_records": total,
                }),
                None,
            )
            .await;
        self.publish(
            &job_key,
            &ProgressSnapshot {
                status: Some(ImportJobStatus::Completed),
                progress: Some(100),
                processed: Some(processed),
                total: Some(total),
                message: Some("Import completed successfully".to_string()),
                ..Default::default()
            },
        )
        .await;

        // Let late readers observe the completed snapshot, then clear it.
        tokio::time::sleep(COMPLETION_OBSERVE_DELAY).await;
        self.clear_snapshot(&job_key).await;

        tracing::info!(%job_id, processed, total, "Import completed");
        ImportOutcome::Completed { processed, total }
    }

    // -----------------------------------------------------------------------
    // Batch loop
    // -----------------------------------------------------------------------

    /// Stream batches off a blocking parser thread and apply them in order.
    /// Returns the raw rows processed.
    async fn import_batches(
        &self,
        job_id: Uuid,
        job_key: &str,
        file_path: &str,
        total: i64,
    ) -> Result<i64, BatchError> {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<Result<Batch, CsvError>>(
            BATCH_CHANNEL_CAPACITY,
        );
        let path = PathBuf::from(file_path);
        let batch_size = self.batch_size;
        tokio::task::spawn_blocking(move || {
            let reader = match csv::read_batches(&path, batch_size) {
                Ok(reader) => reader,
                Err(e) => {
                    let _ = tx.blocking_send(Err(e));
                    return;
                }
            };
            for batch in reader {
                // Receiver gone: the consumer bailed, stop parsing.
                if tx.blocking_send(batch).is_err() {
                    break;
                }
            }
        });

        let mut processed: i64 = 0;
        while let Some(next) = rx.recv().await {
            let batch = match next {
                Ok(batch) => batch,
                Err(e) if e.is_validation() => return Err(BatchError::Validation(e.to_string())),
                Err(e) => return Err(BatchError::transient(e)),
            };
            self.apply_batch(job_id, job_key, &batch, &mut processed, total)
                .await?;
        }
        Ok(processed)
    }

    /// Apply one deduplicated batch: classify, upsert, advance progress,
    /// fan out per-product events, publish the snapshot.
    async fn apply_batch(
        &self,
        job_id: Uuid,
        job_key: &str,
        batch: &Batch,
        processed: &mut i64,
        total: i64,
    ) -> Result<(), BatchError> {
        let skus: Vec<String> = batch
            .rows
            .iter()
            .map(|row| row.sku_normalized.clone())
            .collect();

        // Existence check before the upsert, so affected products can be
        // classified created-vs-updated afterwards.
        let existing: HashSet<String> = ProductRepo::existing_normalized_skus(&self.pool, &skus)
            .await
            .map_err(|e| BatchError::transient(e))?
            .into_iter()
            .collect();

        ProductRepo::upsert_batch(&self.pool, &batch.rows)
            .await
            .map_err(|e| BatchError::transient(e))?;

        // Progress tracks file position: advance by raw rows consumed, not
        // by unique product count.
        *processed += batch.raw_rows as i64;
        let progress = progress_percent(*processed, Some(total));
        ImportJobRepo::advance(&self.pool, job_id, *processed, progress)
            .await
            .map_err(|e| BatchError::transient(e))?;
        tracing::info!(
            %job_id,
            processed = *processed,
            total,
            progress,
            "Batch committed",
        );

        let products = ProductRepo::fetch_by_normalized_skus(&self.pool, &skus)
            .await
            .map_err(|e| BatchError::transient(e))?;
        for product in products {
            let event_type = if existing.contains(&product.sku_normalized) {
                WebhookEventType::ProductUpdated
            } else {
                WebhookEventType::ProductCreated
            };
            match serde_json::to_value(&product) {
                Ok(payload) => self.notifier.notify(event_type, payload, None).await,
                Err(e) => tracing::error!(
                    %job_id,
                    product_id = product.id,
                    error = %e,
                    "Failed to serialize product for webhook payload",
                ),
            }
        }

        self.publish(
            job_key,
            &ProgressSnapshot {
                status: Some(ImportJobStatus::Processing),
                progress: Some(progress),
                processed: Some(*processed),
                total: Some(total),
                ..Default::default()
            },
        )
        .await;

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Failure bookkeeping
    // -----------------------------------------------------------------------

    async fn fail_terminal(
        &self,
        job_id: Uuid,
        file_path: Option<&str>,
        message: &str,
    ) -> ImportOutcome {
        self.record_failure(job_id, file_path, message).await;
        ImportOutcome::TerminalFailure(message.to_string())
    }

    async fn fail_retryable(
        &self,
        job_id: Uuid,
        file_path: Option<&str>,
        message: &str,
        cause: impl std::fmt::Display,
    ) -> ImportOutcome {
        self.record_failure(job_id, file_path, message).await;
        ImportOutcome::Retryable(cause.to_string())
    }

    /// Mark the job failed, emit the failure event, drop the snapshot, and
    /// remove the staged file. Bookkeeping faults here are logged, never
    /// escalated over the failure that brought us here.
    async fn record_failure(&self, job_id: Uuid, file_path: Option<&str>, message: &str) {
        if let Err(e) = ImportJobRepo::fail(&self.pool, job_id, message).await {
            tracing::error!(%job_id, error = %e, "Failed to mark job as failed");
        }
        self.notifier
            .notify(
                WebhookEventType::ImportFailed,
                serde_json::json!({
                    "job_id": job_id.to_string(),
                    "message": message,
                }),
                None,
            )
            .await;
        self.clear_snapshot(&job_id.to_string()).await;
        if let Some(path) = file_path {
            self.cleanup_file(job_id, path).await;
        }
    }

    // -----------------------------------------------------------------------
    // Side-effect helpers
    // -----------------------------------------------------------------------

    /// Publish a snapshot; a progress write failure never aborts an import.
    async fn publish(&self, job_key: &str, snapshot: &ProgressSnapshot) {
        if let Err(e) = self.progress.publish(job_key, snapshot).await {
            tracing::warn!(job_id = job_key, error = %e, "Failed to publish progress snapshot");
        }
    }

    async fn clear_snapshot(&self, job_key: &str) {
        if let Err(e) = self.progress.clear(job_key).await {
            tracing::warn!(job_id = job_key, error = %e, "Failed to clear progress snapshot");
        }
    }

    /// Remove the staged upload, tolerating it already being gone, and
    /// drop the job's file reference.
    async fn cleanup_file(&self, job_id: Uuid, path: &str) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(%job_id, path, error = %e, "Unable to remove temporary file");
            }
        }
        if let Err(e) = ImportJobRepo::clear_file_path(&self.pool, job_id).await {
            tracing::warn!(%job_id, error = %e, "Unable to clear file path on job");
        }
    }
}
