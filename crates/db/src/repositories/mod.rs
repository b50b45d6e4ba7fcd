//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod delivery_repo;
pub mod import_job_repo;
pub mod product_repo;
pub mod webhook_repo;

pub use delivery_repo::DeliveryRepo;
pub use import_job_repo::ImportJobRepo;
pub use product_repo::ProductRepo;
pub use webhook_repo::WebhookRepo;
