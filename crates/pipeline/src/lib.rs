//! The asynchronous import pipeline.
//!
//! [`ImportOrchestrator`] owns the job state machine: it counts rows,
//! drives batched upserts, keeps the durable job row and the ephemeral
//! progress snapshot in step, fans out per-product webhook events, and
//! reports an explicit [`ImportOutcome`] so the worker can distinguish
//! terminal failures from retryable ones.

pub mod orchestrator;
pub mod outcome;

pub use orchestrator::ImportOrchestrator;
pub use outcome::ImportOutcome;
