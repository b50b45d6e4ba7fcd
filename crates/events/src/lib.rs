//! Webhook notification infrastructure.
//!
//! - [`WebhookNotifier`] — resolves the subscribers for an event and
//!   enqueues one independent delivery per subscriber through the
//!   [`DeliveryQueue`] seam. Fire-and-forget from the caller's view.
//! - [`WebhookSender`] — performs a single HTTP POST of an event payload
//!   with a hard timeout; the delivery runner schedules retries around it.

pub mod delivery;
pub mod notify;

pub use delivery::{backoff_delay_secs, DeliveryError, WebhookSender};
pub use notify::{DeliveryQueue, PgDeliveryQueue, WebhookNotifier};
