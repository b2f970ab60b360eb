pub mod archive;
pub mod config;
pub mod extract;
pub mod idempotency;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod order;
pub mod pdf;
pub mod picklist;
pub mod pipeline;
pub mod security;
pub mod server;
pub mod sort;
pub mod store;
pub mod telemetry;
