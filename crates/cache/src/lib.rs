//! Ephemeral progress store.
//!
//! Import workers publish a [`ProgressSnapshot`] here after every batch so
//! the progress stream can surface intra-batch state between durable
//! commits. The store is advisory: it is never consulted for correctness
//! decisions, every write refreshes a bounded TTL, and a terminal job
//! clears its key.
//!
//! [`RedisProgressStore`] is the production backend (one hash per job id);
//! [`MemoryProgressStore`] backs tests and single-process setups.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use stockpile_core::progress::ProgressSnapshot;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Key namespace for per-job progress hashes.
pub const PROGRESS_NAMESPACE: &str = "stockpile:progress";

/// Every publish refreshes the key to this TTL.
pub const PROGRESS_TTL_SECS: i64 = 60 * 60;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for progress store failures.
///
/// Callers on the import path log these and continue; a progress publish
/// failure must never abort an import.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

// ---------------------------------------------------------------------------
// ProgressStore
// ---------------------------------------------------------------------------

/// Sink and lookup for ephemeral per-job progress.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Overwrite the job's snapshot and refresh its TTL. Pure side-effecting
    /// write: never read-modify-write.
    async fn publish(&self, job_id: &str, snapshot: &ProgressSnapshot) -> Result<(), CacheError>;

    /// Delete the job's snapshot outright.
    async fn clear(&self, job_id: &str) -> Result<(), CacheError>;

    /// Current snapshot for the job; empty when absent or expired.
    async fn read(&self, job_id: &str) -> Result<ProgressSnapshot, CacheError>;
}

fn progress_key(job_id: &str) -> String {
    format!("{PROGRESS_NAMESPACE}:{job_id}")
}

// ---------------------------------------------------------------------------
// Redis backend
// ---------------------------------------------------------------------------

/// Redis-backed progress store.
///
/// Uses a multiplexed, auto-reconnecting connection shared across clones.
#[derive(Clone)]
pub struct RedisProgressStore {
    conn: ConnectionManager,
}

impl RedisProgressStore {
    /// Connect to Redis from a URL (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl ProgressStore for RedisProgressStore {
    async fn publish(&self, job_id: &str, snapshot: &ProgressSnapshot) -> Result<(), CacheError> {
        let fields = snapshot.to_fields();
        if fields.is_empty() {
            return Ok(());
        }
        let key = progress_key(job_id);
        let mut conn = self.conn.clone();
        let _: () = conn.hset_multiple(&key, &fields).await?;
        let _: () = conn.expire(&key, PROGRESS_TTL_SECS).await?;
        Ok(())
    }

    async fn clear(&self, job_id: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(progress_key(job_id)).await?;
        Ok(())
    }

    async fn read(&self, job_id: &str) -> Result<ProgressSnapshot, CacheError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(progress_key(job_id)).await?;
        Ok(ProgressSnapshot::from_fields(&fields))
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Process-local progress store. No TTL handling: entries live until
/// cleared or the process exits.
#[derive(Default)]
pub struct MemoryProgressStore {
    entries: Mutex<HashMap<String, ProgressSnapshot>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn publish(&self, job_id: &str, snapshot: &ProgressSnapshot) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().expect("progress store lock poisoned");
        entries.insert(job_id.to_string(), snapshot.clone());
        Ok(())
    }

    async fn clear(&self, job_id: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().expect("progress store lock poisoned");
        entries.remove(job_id);
        Ok(())
    }

    async fn read(&self, job_id: &str) -> Result<ProgressSnapshot, CacheError> {
        let entries = self.entries.lock().expect("progress store lock poisoned");
        Ok(entries.get(job_id).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
