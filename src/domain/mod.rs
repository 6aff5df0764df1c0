//! Domain layer - core types, the client contract and error types.
//!
//! This layer holds pure models and rules without any IO of its own.

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod sanitize;

pub use client::MessagingClient;
pub use config::{AppConfig, BridgeConfig, SyncConfig};
pub use error::{AppError, Result};
pub use models::{
    Chat, ChatExportReport, ChatSummary, ClientEvent, ExportStats, FetchQuery, MediaPayload,
    MessageRecord, PaginationEnd, RawMessage,
};
pub use sanitize::sanitize;
