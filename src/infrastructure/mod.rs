//! Infrastructure layer - external adapters (filesystem, bridge, config).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod archive;
pub mod bridge_client;
pub mod config;
#[cfg(test)]
pub mod fake_client;

pub use archive::{ArchiveLayout, MessageLog};
pub use bridge_client::BridgeClient;
pub use config::{ensure_config_exists, load_config};
