//! Import job lifecycle states.
//!
//! Stored as lowercase text in the `import_jobs.status` column. A job moves
//! strictly forward: `pending → processing → {completed, failed}`.

use serde::{Deserialize, Serialize};

/// Status of a CSV import job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportJobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ImportJobStatus {
    /// The database representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse a database status string. Returns `None` for unknown values.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// A terminal status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ImportJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_states() {
        for status in [
            ImportJobStatus::Pending,
            ImportJobStatus::Processing,
            ImportJobStatus::Completed,
            ImportJobStatus::Failed,
        ] {
            assert_eq!(ImportJobStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert_eq!(ImportJobStatus::parse("queued"), None);
        assert_eq!(ImportJobStatus::parse(""), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ImportJobStatus::Completed.is_terminal());
        assert!(ImportJobStatus::Failed.is_terminal());
        assert!(!ImportJobStatus::Pending.is_terminal());
        assert!(!ImportJobStatus::Processing.is_terminal());
    }
}
