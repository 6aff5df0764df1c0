//! Application layer - the export pipeline.
//!
//! Sync wait, orchestration, per-chat pagination, media storage and the
//! lifecycle controller that ties them to the client.

pub mod chat_exporter;
pub mod controller;
pub mod formatter;
pub mod media;
pub mod orchestrator;
pub mod progress;
pub mod sync_waiter;

pub use controller::ProcessController;
pub use formatter::format_outcome;
