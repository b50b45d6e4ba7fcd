//! Background worker: drains the import-job queue and the webhook
//! delivery queue.
//!
//! Two independent poll loops, each a long-lived Tokio task stopped by a
//! shared `CancellationToken`:
//!
//! - [`ImportRunner`] — claims pending import jobs and hands them to the
//!   orchestrator, requeueing retryable failures with backoff.
//! - [`DeliveryRunner`] — claims due webhook deliveries and POSTs them,
//!   scheduling bounded retries on failure.

pub mod config;
pub mod delivery_runner;
pub mod import_runner;

pub use config::WorkerConfig;
pub use delivery_runner::DeliveryRunner;
pub use import_runner::ImportRunner;
