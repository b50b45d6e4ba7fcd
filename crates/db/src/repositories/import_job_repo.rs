//! Repository for the `import_jobs` table.
//!
//! The table is both the durable job record and the import queue:
//! [`ImportJobRepo::claim_next`] hands a due `pending` row to exactly one
//! worker via `FOR UPDATE SKIP LOCKED`, and [`ImportJobRepo::requeue`]
//! returns a transiently-failed row to the queue with backoff.

use sqlx::PgPool;
use stockpile_core::status::ImportJobStatus;
use uuid::Uuid;

use crate::models::import_job::{CreateImportJob, ImportJob};

// ---------------------------------------------------------------------------
// Column list
// ---------------------------------------------------------------------------

const COLUMNS: &str = "\
    id, status, progress, total_records, processed_records, file_path, \
    original_filename, content_type, error_message, attempts, \
    next_attempt_at, claimed_at, created_at, updated_at";

/// Provides lifecycle and queue operations for import jobs.
pub struct ImportJobRepo;

impl ImportJobRepo {
    // -----------------------------------------------------------------------
    // Creation / reads
    // -----------------------------------------------------------------------

    /// Create a new pending job for a staged upload.
    pub async fn create(
        pool: &PgPool,
        id: Uuid,
        input: &CreateImportJob,
    ) -> Result<ImportJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO import_jobs (id, status, file_path, original_filename, content_type) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportJob>(&query)
            .bind(id)
            .bind(ImportJobStatus::Pending.as_str())
            .bind(&input.file_path)
            .bind(input.original_filename.as_deref())
            .bind(input.content_type.as_deref())
            .fetch_one(pool)
            .await
    }

    /// Find a job by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ImportJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM import_jobs WHERE id = $1");
        sqlx::query_as::<_, ImportJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Queue operations
    // -----------------------------------------------------------------------

    /// Claim the next due pending job for this worker, if any.
    ///
    /// `FOR UPDATE SKIP LOCKED` guarantees a given job id is handed to at
    /// most one worker at a time.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<ImportJob>, sqlx::Error> {
        let query = format!(
            "UPDATE import_jobs \
             SET claimed_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM import_jobs \
                 WHERE status = $1 AND claimed_at IS NULL AND next_attempt_at <= NOW() \
                 ORDER BY created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportJob>(&query)
            .bind(ImportJobStatus::Pending.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Return a transiently-failed job to the queue with a backoff delay.
    ///
    /// Only succeeds while `attempts < max_attempts`; returns `false` when
    /// the attempt budget is exhausted (the row stays in its failed state).
    pub async fn requeue(
        pool: &PgPool,
        id: Uuid,
        max_attempts: i32,
        backoff_secs: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE import_jobs \
             SET status = $2, claimed_at = NULL, \
                 next_attempt_at = NOW() + ($3 || ' seconds')::INTERVAL, \
                 updated_at = NOW() \
             WHERE id = $1 AND attempts < $4",
        )
        .bind(id)
        .bind(ImportJobStatus::Pending.as_str())
        .bind(backoff_secs.to_string())
        .bind(max_attempts)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Lifecycle transitions
    // -----------------------------------------------------------------------

    /// Transition a job into `processing` under a row-level write lock,
    /// resetting progress counters and clearing any stale error from a
    /// previous attempt. Returns the refreshed row, or `None` when the job
    /// id no longer exists.
    pub async fn begin_processing(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<ImportJob>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let lock_query = format!("SELECT {COLUMNS} FROM import_jobs WHERE id = $1 FOR UPDATE");
        let existing = sqlx::query_as::<_, ImportJob>(&lock_query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let update_query = format!(
            "UPDATE import_jobs \
             SET status = $2, progress = 0, processed_records = 0, \
                 error_message = NULL, attempts = attempts + 1, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let job = sqlx::query_as::<_, ImportJob>(&update_query)
            .bind(id)
            .bind(ImportJobStatus::Processing.as_str())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(job))
    }

    /// Persist the total row count once the counting pass completes.
    pub async fn set_total(pool: &PgPool, id: Uuid, total: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE import_jobs \
             SET total_records = $2, processed_records = 0, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(total)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record batch completion: absolute processed count and derived
    /// progress percentage.
    pub async fn advance(
        pool: &PgPool,
        id: Uuid,
        processed: i64,
        progress: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE import_jobs \
             SET processed_records = $2, progress = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(processed)
        .bind(progress)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a job completed, forcing progress to 100.
    pub async fn complete(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE import_jobs \
             SET status = $2, progress = 100, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(ImportJobStatus::Completed.as_str())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a job failed with the surfaced message.
    pub async fn fail(pool: &PgPool, id: Uuid, message: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE import_jobs \
             SET status = $2, error_message = $3, progress = 0, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(ImportJobStatus::Failed.as_str())
        .bind(message)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Drop the staged-file reference once processing has ended.
    pub async fn clear_file_path(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE import_jobs SET file_path = NULL, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
