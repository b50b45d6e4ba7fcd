//! Result of one orchestrator run.

/// Outcome of processing an import job once.
///
/// The dispatcher integration maps this onto its retry mechanism: only
/// [`ImportOutcome::Retryable`] puts the job back on the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The job reached `completed`.
    Completed { processed: i64, total: i64 },

    /// The job reached `failed` on bad input (or a vanished job row);
    /// re-running the same input cannot succeed.
    TerminalFailure(String),

    /// The job failed on an infrastructure fault; a re-run from scratch is
    /// safe because upserts are keyed by normalized SKU. Carries the
    /// underlying cause for the worker log.
    Retryable(String),
}

impl ImportOutcome {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}
