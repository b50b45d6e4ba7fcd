/// Worker configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Queue poll interval in seconds (default: `1`).
    pub poll_interval_secs: u64,
    /// Attempt budget for one import job, counting the first run
    /// (default: `3`). Only transient failures consume retries.
    pub import_max_attempts: i32,
    /// Fixed delay before a requeued import job becomes due again
    /// (default: `5`).
    pub import_retry_backoff_secs: i64,
    /// Deliveries claimed per delivery-runner tick (default: `20`).
    pub delivery_batch_size: i64,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default |
    /// |-----------------------------|---------|
    /// | `WORKER_POLL_INTERVAL_SECS` | `1`     |
    /// | `IMPORT_MAX_ATTEMPTS`       | `3`     |
    /// | `IMPORT_RETRY_BACKOFF_SECS` | `5`     |
    /// | `DELIVERY_BATCH_SIZE`       | `20`    |
    pub fn from_env() -> Self {
        Self {
            poll_interval_secs: env_parsed("WORKER_POLL_INTERVAL_SECS", 1),
            import_max_attempts: env_parsed("IMPORT_MAX_ATTEMPTS", 3),
            import_retry_backoff_secs: env_parsed("IMPORT_RETRY_BACKOFF_SECS", 5),
            delivery_batch_size: env_parsed("DELIVERY_BATCH_SIZE", 20),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 1,
            import_max_attempts: 3,
            import_retry_backoff_secs: 5,
            delivery_batch_size: 20,
        }
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_interval_secs, 1);
        assert_eq!(config.import_max_attempts, 3);
        assert_eq!(config.import_retry_backoff_secs, 5);
        assert_eq!(config.delivery_batch_size, 20);
    }
}
