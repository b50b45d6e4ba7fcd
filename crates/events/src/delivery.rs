//! Webhook HTTP delivery.
//!
//! [`WebhookSender`] performs one POST per attempt with a 10-second
//! timeout. Retry scheduling is the delivery queue's job: a failed attempt
//! is recorded on the delivery row with a backoff from
//! [`backoff_delay_secs`], so retries survive worker restarts.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Base retry delay; doubles per failed attempt (5 s, 10 s, 20 s, ...).
pub const RETRY_BASE_DELAY_SECS: i64 = 5;

/// Default attempt budget per delivery.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Backoff before the next attempt, given the 1-based attempt that just
/// failed.
pub fn backoff_delay_secs(attempt: i32) -> i64 {
    let exponent = attempt.max(1) - 1;
    RETRY_BASE_DELAY_SECS.saturating_mul(1_i64 << exponent.min(16))
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for a single failed delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned status >= 400.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

impl DeliveryError {
    /// The response status observed, when the request got that far.
    pub fn status_code(&self) -> Option<i16> {
        match self {
            Self::Request(e) => e.status().map(|status| status.as_u16() as i16),
            Self::HttpStatus(status) => Some(*status as i16),
        }
    }
}

// ---------------------------------------------------------------------------
// WebhookSender
// ---------------------------------------------------------------------------

/// Sends event payloads to external webhook endpoints.
pub struct WebhookSender {
    client: reqwest::Client,
}

impl WebhookSender {
    /// Create a sender with a pre-configured HTTP client.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client }
    }

    /// Execute one delivery attempt: POST `{"event": .., "data": ..}`.
    ///
    /// Returns the response status on success. A status >= 400 or a
    /// transport-level failure is an error; the caller decides whether to
    /// reschedule.
    pub async fn send(
        &self,
        url: &str,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<u16, DeliveryError> {
        let body = serde_json::json!({
            "event": event_type,
            "data": payload,
        });

        let response = self.client.post(url).json(&body).send().await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(DeliveryError::HttpStatus(status.as_u16()));
        }
        Ok(status.as_u16())
    }
}

impl Default for WebhookSender {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
