pub mod imports;
pub mod products;
pub mod progress;
pub mod webhooks;
