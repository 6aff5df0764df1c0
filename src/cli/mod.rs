//! CLI interface using clap.
//!
//! Everything has a default; flags only override the config file.

use std::path::PathBuf;

use clap::Parser;

use crate::domain::AppConfig;

/// Export direct WhatsApp chats, their messages and image/video media.
///
/// Needs the automation bridge running with an authenticated session.
#[derive(Parser, Debug)]
#[command(name = "wa-direct-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Config file (default: ~/.wa-direct-export/config.toml).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Archive root directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Base URL of the automation bridge.
    #[arg(short, long)]
    pub bridge_url: Option<String>,

    /// Write a default config file and exit.
    #[arg(long)]
    pub init_config: bool,
}

impl Cli {
    /// Apply command-line overrides on top of a loaded config.
    #[must_use]
    pub fn apply(&self, mut config: AppConfig) -> AppConfig {
        if let Some(output) = &self.output {
            config.export.output_dir.clone_from(output);
        }
        if let Some(url) = &self.bridge_url {
            config.bridge.base_url.clone_from(url);
        }
        config
    }

    /// Config file this invocation refers to.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(AppConfig::default_config_path)
    }
}
