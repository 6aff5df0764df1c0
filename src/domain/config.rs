//! Export configuration.
//!
//! Every field has a default, so an empty or partial config file is valid
//! and a missing one yields the built-in budgets.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Archive and extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Archive root directory.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Extraction time budget in seconds. Also the hard timeout.
    #[serde(default = "default_extract_secs")]
    pub extract_secs: u64,

    /// Messages requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            extract_secs: default_extract_secs(),
            page_size: default_page_size(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

const fn default_extract_secs() -> u64 {
    300 // 5 minutes
}

const fn default_page_size() -> usize {
    500
}

/// Chat-list synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Upper bound for the stabilization wait, in seconds.
    #[serde(default = "default_sync_max_secs")]
    pub max_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Consecutive unchanged polls that count as stable.
    #[serde(default = "default_stable_polls")]
    pub stable_polls: u32,

    /// Minimum seconds between "syncing" log lines.
    #[serde(default = "default_log_interval_secs")]
    pub log_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_secs: default_sync_max_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            stable_polls: default_stable_polls(),
            log_interval_secs: default_log_interval_secs(),
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub const fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_secs)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn log_interval(&self) -> Duration {
        Duration::from_secs(self.log_interval_secs)
    }
}

const fn default_sync_max_secs() -> u64 {
    300
}

const fn default_poll_interval_ms() -> u64 {
    1000
}

const fn default_stable_polls() -> u32 {
    3
}

const fn default_log_interval_secs() -> u64 {
    10
}

/// Where the automation bridge listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

/// Terminal output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Draw countdown bars on stdout.
    #[serde(default = "default_progress")]
    pub progress: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            progress: default_progress(),
        }
    }
}

const fn default_progress() -> bool {
    true
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub ui: UiConfig,
}

impl AppConfig {
    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wa-direct-export")
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    #[must_use]
    pub const fn extract_budget(&self) -> Duration {
        Duration::from_secs(self.export.extract_secs)
    }
}
