//! End-of-run summary for the terminal.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::ExportStats;

use super::controller::{RunOutcome, ShutdownReason};

/// Formats export totals as a two-column table.
#[must_use]
pub fn format_stats_table(stats: &ExportStats) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Metric", "Value"]);

    let rows = [
        (
            "Started",
            stats.started_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ),
        ("Chats listed", stats.chats_listed.to_string()),
        ("Direct chats", stats.chats_eligible.to_string()),
        ("Exported", stats.chats_exported.to_string()),
        ("Failed", stats.chats_failed.to_string()),
        ("Cut by deadline", stats.chats_truncated.to_string()),
        ("Messages", stats.messages_written.to_string()),
        ("Media files", stats.media_saved.to_string()),
        ("Elapsed", format!("{:.1}s", stats.elapsed.as_secs_f64())),
    ];
    for (metric, value) in rows {
        table.add_row(vec![metric.to_string(), value]);
    }

    table.to_string()
}

/// Formats the outcome of a run: the shutdown reason and, if the export got
/// far enough, its totals.
#[must_use]
pub fn format_outcome(outcome: &RunOutcome) -> String {
    let reason = match outcome.reason {
        ShutdownReason::Completed => outcome.reason.to_string().green(),
        ShutdownReason::TimedOut => outcome.reason.to_string().yellow(),
        _ => outcome.reason.to_string().red(),
    };

    match &outcome.stats {
        Some(stats) => format!("{}\n{}", reason.bold(), format_stats_table(stats)),
        None => format!("{}\n  No export statistics available", reason.bold()),
    }
}
