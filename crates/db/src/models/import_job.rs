//! Import job models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stockpile_core::types::Timestamp;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `import_jobs` table.
///
/// The durable lifecycle record of a CSV import, and simultaneously the
/// import queue entry: a `pending` row with a due `next_attempt_at` and no
/// `claimed_at` is claimable by exactly one worker.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: Uuid,
    pub status: String,
    pub progress: i32,
    /// Set once the counting pass completes; null before.
    pub total_records: Option<i64>,
    pub processed_records: i64,
    /// Staged upload location; cleared when processing ends.
    pub file_path: Option<String>,
    pub original_filename: Option<String>,
    pub content_type: Option<String>,
    /// Set only on failure.
    pub error_message: Option<String>,
    pub attempts: i32,
    pub next_attempt_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// Input for creating a new import job at upload time.
#[derive(Debug, Clone)]
pub struct CreateImportJob {
    pub file_path: String,
    pub original_filename: Option<String>,
    pub content_type: Option<String>,
}
