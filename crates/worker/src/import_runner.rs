//! Import job runner.
//!
//! Polls the import queue every `poll_interval` and hands each claimed job
//! to the orchestrator. `FOR UPDATE SKIP LOCKED` in the claim guarantees a
//! job id is processed by exactly one worker at a time.

use std::sync::Arc;
use std::time::Duration;

use stockpile_db::repositories::ImportJobRepo;
use stockpile_db::DbPool;
use stockpile_pipeline::{ImportOrchestrator, ImportOutcome};
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;

/// Long-lived task that drains the import-job queue.
pub struct ImportRunner {
    pool: DbPool,
    orchestrator: Arc<ImportOrchestrator>,
    poll_interval: Duration,
    max_attempts: i32,
    retry_backoff_secs: i64,
}

impl ImportRunner {
    pub fn new(pool: DbPool, orchestrator: Arc<ImportOrchestrator>, config: &WorkerConfig) -> Self {
        Self {
            pool,
            orchestrator,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            max_attempts: config.import_max_attempts,
            retry_backoff_secs: config.import_retry_backoff_secs,
        }
    }

    /// Run the poll loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Import runner started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Import runner shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.try_claim().await {
                        tracing::error!(error = %e, "Import claim cycle failed");
                    }
                }
            }
        }
    }

    /// One cycle: claim the next due job, if any, and process it to a
    /// terminal outcome.
    async fn try_claim(&self) -> Result<(), sqlx::Error> {
        let Some(job) = ImportJobRepo::claim_next(&self.pool).await? else {
            return Ok(());
        };

        tracing::info!(
            job_id = %job.id,
            attempt = job.attempts + 1,
            "Import job claimed",
        );

        match self.orchestrator.run(job.id).await {
            ImportOutcome::Completed { processed, total } => {
                tracing::info!(job_id = %job.id, processed, total, "Import job finished");
            }
            ImportOutcome::TerminalFailure(message) => {
                tracing::warn!(job_id = %job.id, error = %message, "Import job failed terminally");
            }
            ImportOutcome::Retryable(cause) => {
                let requeued = ImportJobRepo::requeue(
                    &self.pool,
                    job.id,
                    self.max_attempts,
                    self.retry_backoff_secs,
                )
                .await?;
                if requeued {
                    tracing::warn!(
                        job_id = %job.id,
                        error = %cause,
                        backoff_secs = self.retry_backoff_secs,
                        "Import job failed transiently, requeued",
                    );
                } else {
                    tracing::error!(
                        job_id = %job.id,
                        error = %cause,
                        max_attempts = self.max_attempts,
                        "Import job failed transiently, retries exhausted",
                    );
                }
            }
        }
        Ok(())
    }
}
