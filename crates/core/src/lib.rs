//! Domain types and pure logic for the catalog import service.
//!
//! This crate has no database or network dependencies. It provides:
//!
//! - Shared type aliases ([`types::DbId`], [`types::Timestamp`]) and the
//!   domain error type ([`error::CoreError`]).
//! - SKU normalization ([`sku::normalize_sku`]), the uniqueness key for
//!   every product write path.
//! - The webhook event vocabulary ([`events::WebhookEventType`]).
//! - The CSV batch reader ([`csv::count_rows`], [`csv::read_batches`]).
//! - The typed progress model ([`progress::ProgressSnapshot`],
//!   [`progress::ProgressPayload`]) shared by the pipeline, the cache
//!   layer, and the SSE stream.

pub mod csv;
pub mod error;
pub mod events;
pub mod progress;
pub mod sku;
pub mod status;
pub mod types;
