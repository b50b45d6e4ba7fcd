//! HTTP API for the catalog import service.
//!
//! Axum server exposing product CRUD, webhook management, CSV upload, and
//! the live import progress stream. All background processing happens in
//! the separate worker binary; the handlers here only stage uploads and
//! create queue rows.

pub mod config;
pub mod error;
pub mod handlers;
pub mod query;
pub mod response;
pub mod routes;
pub mod state;
