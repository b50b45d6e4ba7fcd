//! Typed progress model.
//!
//! Two shapes with an explicit, total merge between them:
//!
//! - [`ProgressSnapshot`] — the ephemeral, optional-field record a worker
//!   publishes to the cache store after every batch. Encoded as string
//!   fields for the hash-per-job cache layout.
//! - [`ProgressPayload`] — the event body emitted on the progress stream,
//!   seeded from the durable job row and overlaid with any snapshot
//!   fields that are present.
//!
//! The snapshot is advisory: durable `processed_records`/`total_records`
//! are never displaced by snapshot counters, and a snapshot `progress`
//! that fails to parse coerces to 0 rather than poisoning the stream.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::status::ImportJobStatus;

// ── Snapshot ─────────────────────────────────────────────────────────

/// Ephemeral per-job progress record. All fields optional; the whole
/// snapshot is overwritten on every publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub status: Option<ImportJobStatus>,
    pub progress: Option<i32>,
    pub processed: Option<i64>,
    pub total: Option<i64>,
    pub phase: Option<String>,
    pub message: Option<String>,
}

impl ProgressSnapshot {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.progress.is_none()
            && self.processed.is_none()
            && self.total.is_none()
            && self.phase.is_none()
            && self.message.is_none()
    }

    /// Encode the present fields as string pairs for the cache hash.
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        if let Some(status) = self.status {
            fields.push(("status", status.as_str().to_string()));
        }
        if let Some(progress) = self.progress {
            fields.push(("progress", progress.to_string()));
        }
        if let Some(processed) = self.processed {
            fields.push(("processed", processed.to_string()));
        }
        if let Some(total) = self.total {
            fields.push(("total", total.to_string()));
        }
        if let Some(phase) = &self.phase {
            fields.push(("phase", phase.clone()));
        }
        if let Some(message) = &self.message {
            fields.push(("message", message.clone()));
        }
        fields
    }

    /// Decode a cache hash back into a snapshot.
    ///
    /// Unknown fields are ignored. A present-but-unparseable `progress`
    /// coerces to 0; unparseable counters are dropped.
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        Self {
            status: fields
                .get("status")
                .and_then(|value| ImportJobStatus::parse(value)),
            progress: fields
                .get("progress")
                .map(|value| value.parse().unwrap_or(0)),
            processed: fields.get("processed").and_then(|value| value.parse().ok()),
            total: fields.get("total").and_then(|value| value.parse().ok()),
            phase: fields.get("phase").cloned(),
            message: fields.get("message").cloned(),
        }
    }
}

// ── Stream payload ───────────────────────────────────────────────────

/// Body of one `progress` event on the import progress stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressPayload {
    pub job_id: String,
    pub status: ImportJobStatus,
    pub progress: i32,
    pub processed_records: i64,
    pub total_records: i64,
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressPayload {
    /// Overlay snapshot fields onto a durable-seeded payload.
    ///
    /// Status, progress, phase, and message are taken from the snapshot
    /// when present. The durable record counters always win: the payload
    /// is seeded with them (defaulting to 0), so the snapshot's
    /// `processed`/`total` never fill an already-present field.
    pub fn merge_snapshot(mut self, snapshot: &ProgressSnapshot) -> Self {
        if let Some(status) = snapshot.status {
            self.status = status;
        }
        if let Some(progress) = snapshot.progress {
            self.progress = progress;
        }
        if let Some(phase) = &snapshot.phase {
            self.phase = Some(phase.clone());
        }
        if let Some(message) = &snapshot.message {
            self.message = Some(message.clone());
        }
        self
    }
}

// ── Progress math ────────────────────────────────────────────────────

/// Percentage of raw rows processed, floored and capped at 100.
/// A missing or zero total yields 0.
pub fn progress_percent(processed: i64, total: Option<i64>) -> i32 {
    match total {
        Some(total) if total > 0 => {
            let percent = processed.saturating_mul(100) / total;
            percent.min(100) as i32
        }
        _ => 0,
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_payload() -> ProgressPayload {
        ProgressPayload {
            job_id: "test-job".to_string(),
            status: ImportJobStatus::Processing,
            progress: 40,
            processed_records: 400,
            total_records: 1000,
            error_message: None,
            phase: None,
            message: None,
        }
    }

    // -- progress_percent tests --

    #[test]
    fn test_progress_is_floored() {
        assert_eq!(progress_percent(1, Some(3)), 33);
        assert_eq!(progress_percent(2, Some(3)), 66);
    }

    #[test]
    fn test_progress_capped_at_100() {
        assert_eq!(progress_percent(5000, Some(1000)), 100);
    }

    #[test]
    fn test_progress_zero_or_missing_total() {
        assert_eq!(progress_percent(10, Some(0)), 0);
        assert_eq!(progress_percent(10, None), 0);
        assert_eq!(progress_percent(0, Some(100)), 0);
    }

    #[test]
    fn test_progress_monotonic_over_batch_sequence() {
        let total = Some(2500_i64);
        let mut processed = 0_i64;
        let mut last = 0;
        for raw in [1000, 1000, 500] {
            processed += raw;
            let percent = progress_percent(processed, total);
            assert!(percent >= last);
            assert!((0..=100).contains(&percent));
            last = percent;
        }
        assert_eq!(last, 100);
    }

    // -- snapshot field codec tests --

    #[test]
    fn test_snapshot_round_trip() {
        let snapshot = ProgressSnapshot {
            status: Some(ImportJobStatus::Processing),
            progress: Some(42),
            processed: Some(420),
            total: Some(1000),
            phase: Some("importing".to_string()),
            message: Some("Starting import".to_string()),
        };
        let fields: HashMap<String, String> = snapshot
            .to_fields()
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        assert_eq!(ProgressSnapshot::from_fields(&fields), snapshot);
    }

    #[test]
    fn test_snapshot_absent_fields_stay_absent() {
        let snapshot = ProgressSnapshot {
            status: Some(ImportJobStatus::Failed),
            progress: Some(0),
            message: Some("boom".to_string()),
            ..Default::default()
        };
        let fields: HashMap<String, String> = snapshot
            .to_fields()
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        assert_eq!(fields.len(), 3);
        let decoded = ProgressSnapshot::from_fields(&fields);
        assert_eq!(decoded.processed, None);
        assert_eq!(decoded.phase, None);
    }

    #[test]
    fn test_unparseable_progress_coerces_to_zero() {
        let mut fields = HashMap::new();
        fields.insert("progress".to_string(), "not-a-number".to_string());
        let decoded = ProgressSnapshot::from_fields(&fields);
        assert_eq!(decoded.progress, Some(0));
    }

    #[test]
    fn test_empty_hash_is_empty_snapshot() {
        let decoded = ProgressSnapshot::from_fields(&HashMap::new());
        assert!(decoded.is_empty());
    }

    // -- merge tests --

    #[test]
    fn test_merge_overlays_status_progress_phase_message() {
        let snapshot = ProgressSnapshot {
            status: Some(ImportJobStatus::Completed),
            progress: Some(100),
            phase: Some("importing".to_string()),
            message: Some("Import completed successfully".to_string()),
            ..Default::default()
        };
        let merged = seeded_payload().merge_snapshot(&snapshot);
        assert_eq!(merged.status, ImportJobStatus::Completed);
        assert_eq!(merged.progress, 100);
        assert_eq!(merged.phase.as_deref(), Some("importing"));
        assert_eq!(
            merged.message.as_deref(),
            Some("Import completed successfully")
        );
    }

    #[test]
    fn test_merge_keeps_durable_counters() {
        let snapshot = ProgressSnapshot {
            processed: Some(999),
            total: Some(9999),
            ..Default::default()
        };
        let merged = seeded_payload().merge_snapshot(&snapshot);
        assert_eq!(merged.processed_records, 400);
        assert_eq!(merged.total_records, 1000);
    }

    #[test]
    fn test_merge_with_empty_snapshot_is_identity() {
        let merged = seeded_payload().merge_snapshot(&ProgressSnapshot::default());
        assert_eq!(merged, seeded_payload());
    }
}
