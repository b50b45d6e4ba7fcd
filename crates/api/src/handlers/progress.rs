//! Live import progress stream.
//!
//! Server-sent events, one tick per second. Each tick re-reads the durable
//! job row and the ephemeral snapshot, emits a `progress` event with the
//! merged payload, and ends the stream after the tick that observed a
//! terminal status. A vanished job row emits one `error` event and ends.
//! There is no history: a slow subscriber just sees the latest state.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use stockpile_cache::ProgressStore;
use stockpile_core::progress::{ProgressPayload, ProgressSnapshot};
use stockpile_core::status::ImportJobStatus;
use stockpile_db::models::import_job::ImportJob;
use stockpile_db::repositories::ImportJobRepo;
use stockpile_db::DbPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Interval between progress ticks.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// GET /api/v1/imports/{id}/progress
///
/// Stream merged progress events until the job reaches a terminal status.
/// 404s before the stream starts when the job does not exist.
pub async fn stream_progress(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    ImportJobRepo::find_by_id(&state.pool, job_id)
        .await?
        .ok_or(AppError::NotFound("Import job"))?;

    let stream = progress_events(state.pool.clone(), Arc::clone(&state.progress), job_id);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// ---------------------------------------------------------------------------
// Event stream
// ---------------------------------------------------------------------------

struct TickState {
    pool: DbPool,
    progress: Arc<dyn ProgressStore>,
    job_id: Uuid,
    ticks: u64,
    finished: bool,
}

/// Terminal-bounded lazy event sequence; the terminal tick is delivered,
/// then the stream ends.
fn progress_events(
    pool: DbPool,
    progress: Arc<dyn ProgressStore>,
    job_id: Uuid,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let initial = TickState {
        pool,
        progress,
        job_id,
        ticks: 0,
        finished: false,
    };

    futures::stream::unfold(initial, |mut state| async move {
        if state.finished {
            return None;
        }
        if state.ticks > 0 {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        state.ticks += 1;

        let event = tick(&mut state).await;
        Some((Ok(event), state))
    })
}

/// One tick: merge durable and ephemeral state into a single event.
async fn tick(state: &mut TickState) -> Event {
    let job = match ImportJobRepo::find_by_id(&state.pool, state.job_id).await {
        Ok(job) => job,
        Err(e) => {
            tracing::error!(job_id = %state.job_id, error = %e, "Progress tick failed to read job");
            None
        }
    };

    let Some(job) = job else {
        state.finished = true;
        return error_event(state.job_id, "Job not found");
    };

    let status = ImportJobStatus::parse(&job.status).unwrap_or(ImportJobStatus::Pending);

    let snapshot = match state.progress.read(&state.job_id.to_string()).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!(job_id = %state.job_id, error = %e, "Progress tick failed to read snapshot");
            ProgressSnapshot::default()
        }
    };

    let payload = seed_payload(&job, status).merge_snapshot(&snapshot);

    // Terminal tick is delivered, then the stream ends. Termination keys
    // off the durable status: the snapshot is advisory only.
    if status.is_terminal() {
        state.finished = true;
    }

    match Event::default().event("progress").json_data(&payload) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(job_id = %state.job_id, error = %e, "Failed to serialize progress event");
            Event::default().event("progress").data("{}")
        }
    }
}

/// Seed the payload from durable fields, defaulting absent counters to 0.
fn seed_payload(job: &ImportJob, status: ImportJobStatus) -> ProgressPayload {
    ProgressPayload {
        job_id: job.id.to_string(),
        status,
        progress: job.progress,
        processed_records: job.processed_records,
        total_records: job.total_records.unwrap_or(0),
        error_message: job.error_message.clone(),
        phase: None,
        message: None,
    }
}

fn error_event(job_id: Uuid, message: &str) -> Event {
    let body = serde_json::json!({
        "message": message,
        "job_id": job_id.to_string(),
    });
    match Event::default().event("error").json_data(&body) {
        Ok(event) => event,
        Err(_) => Event::default().event("error").data("{}"),
    }
}
