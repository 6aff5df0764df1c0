//! wa-direct-export - archive direct WhatsApp conversations.
//!
//! Talks to a local automation bridge that owns an authenticated WhatsApp
//! Web session, waits for the chat list to settle, then exports every
//! one-to-one chat within a fixed time budget:
//!
//!   output/index.json                      chats exported in this run
//!   output/chats/<chat>/chat.json          chat metadata
//!   output/chats/<chat>/messages.jsonl     one message per line
//!   output/media/<chat>/<message>.<ext>    image and video attachments

mod application;
mod cli;
mod domain;
mod infrastructure;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{format_outcome, ProcessController};
use cli::Cli;
use infrastructure::{ensure_config_exists, load_config, BridgeClient};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
async fn run(cli: Cli) -> domain::Result<()> {
    if cli.init_config {
        let path = cli.config_path();
        ensure_config_exists(&path)?;
        println!("{} Config at {}", "✓".green().bold(), path.display());
        return Ok(());
    }

    let config = cli.apply(load_config(cli.config.as_deref())?);
    let client = BridgeClient::new(&config.bridge)?;

    tracing::info!(
        bridge = %config.bridge.base_url,
        output = %config.export.output_dir.display(),
        "Starting client"
    );

    let outcome = ProcessController::new(&client, &config).run().await?;

    println!();
    println!("{}", format_outcome(&outcome));

    Ok(())
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
