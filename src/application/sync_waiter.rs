//! Waiting for the client's chat list to settle.
//!
//! The client loads chats lazily, so listing them right after login can miss
//! many. The waiter nudges the list to load, then polls the number of loaded
//! chats until it stops changing or the time budget runs out.

use std::time::Duration;

use tokio::time::Instant;

use crate::domain::{MessagingClient, SyncConfig};

use super::progress::ProgressBoard;

/// Where the stabilization wait stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Polling,
    /// The count stayed the same for the required number of polls.
    Stable,
    TimedOut,
}

/// Consecutive-unchanged-polls detector.
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    required: u32,
    previous: usize,
    unchanged: u32,
}

impl StabilityTracker {
    #[must_use]
    pub const fn new(required: u32) -> Self {
        Self {
            required,
            previous: 0,
            unchanged: 0,
        }
    }

    /// Feed one poll result and get the resulting state.
    pub fn observe(&mut self, count: usize) -> SyncState {
        if count == self.previous {
            self.unchanged += 1;
        } else {
            self.unchanged = 0;
        }
        self.previous = count;

        if self.unchanged >= self.required {
            SyncState::Stable
        } else {
            SyncState::Polling
        }
    }
}

/// Result of a sync wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    pub state: SyncState,
    pub last_count: usize,
    pub polls: u32,
}

pub struct SyncWaiter<'a> {
    config: &'a SyncConfig,
    board: &'a ProgressBoard,
}

impl<'a> SyncWaiter<'a> {
    pub const fn new(config: &'a SyncConfig, board: &'a ProgressBoard) -> Self {
        Self { config, board }
    }

    /// Wait until the loaded chat count is stable, for at most `max`.
    ///
    /// Never fails: scroll errors are ignored and a failed count read counts
    /// as zero loaded chats.
    pub async fn wait_for_sync<C: MessagingClient + ?Sized>(
        &self,
        client: &C,
        max: Duration,
    ) -> SyncOutcome {
        let progress = self
            .board
            .start(max, format!("Sync ({}s)", max.as_secs()));

        if let Err(e) = client.force_load_chat_list().await {
            tracing::debug!(error = %e, "Could not scroll chat list");
        }

        let start = Instant::now();
        let mut tracker = StabilityTracker::new(self.config.stable_polls);
        let mut last_log: Option<Instant> = None;
        let mut outcome = SyncOutcome {
            state: SyncState::TimedOut,
            last_count: 0,
            polls: 0,
        };

        while start.elapsed() < max {
            let count = client.loaded_chat_count().await.unwrap_or_else(|e| {
                tracing::debug!(error = %e, "Chat count unavailable");
                0
            });
            outcome.polls += 1;
            outcome.last_count = count;

            let state = tracker.observe(count);

            if count > 0 && last_log.is_none_or(|at| at.elapsed() > self.config.log_interval()) {
                tracing::info!(chats = count, "Syncing chats... {count} loaded");
                last_log = Some(Instant::now());
            }

            if state == SyncState::Stable {
                outcome.state = SyncState::Stable;
                break;
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }

        progress.stop();

        tracing::info!(
            state = ?outcome.state,
            chats = outcome.last_count,
            polls = outcome.polls,
            "Chat sync finished"
        );

        outcome
    }
}
