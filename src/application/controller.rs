//! Client lifecycle and shutdown.
//!
//! Several things can end a run: the export finishing, the hard timeout,
//! a disconnect, an auth failure or the client window closing. All of them
//! go through one [`ShutdownGuard`], so the teardown runs exactly once and
//! reports the first cause.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::{AppConfig, ClientEvent, ExportStats, MessagingClient, Result};

use super::orchestrator::ExportOrchestrator;
use super::progress::ProgressBoard;

/// Upper bound for each teardown call, so an unresponsive client cannot
/// keep the process alive.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Why the run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Completed,
    TimedOut,
    Disconnected(Option<String>),
    AuthFailure(Option<String>),
    WindowClosed,
}

impl ShutdownReason {
    /// Reason carried by a lifecycle event that ends the session.
    #[must_use]
    pub fn from_event(event: ClientEvent) -> Option<Self> {
        match event {
            ClientEvent::Disconnected(reason) => Some(Self::Disconnected(reason)),
            ClientEvent::AuthFailure(message) => Some(Self::AuthFailure(message)),
            ClientEvent::WindowClosed => Some(Self::WindowClosed),
            ClientEvent::Qr | ClientEvent::Ready => None,
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "Shutdown: export completed"),
            Self::TimedOut => write!(f, "Shutdown: extraction time budget exhausted"),
            Self::Disconnected(reason) => write!(
                f,
                "Shutdown: client disconnected ({})",
                reason.as_deref().unwrap_or("no reason")
            ),
            Self::AuthFailure(message) => write!(
                f,
                "Shutdown: authentication failure ({})",
                message.as_deref().unwrap_or("no detail")
            ),
            Self::WindowClosed => write!(f, "Shutdown: client window closed"),
        }
    }
}

/// One-shot shutdown request shared by every trigger.
#[derive(Debug, Default)]
pub struct ShutdownGuard {
    token: CancellationToken,
    reason: Mutex<Option<ShutdownReason>>,
    torn_down: AtomicBool,
}

impl ShutdownGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Returns `false` if an earlier trigger already won.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        let mut slot = self.reason.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            tracing::debug!(ignored = %reason, "Shutdown already requested");
            return false;
        }
        *slot = Some(reason);
        self.token.cancel();
        true
    }

    #[must_use]
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once any trigger has fired.
    pub async fn triggered(&self) {
        self.token.cancelled().await;
    }

    /// Claim the teardown. Only the first caller after a trigger gets the reason.
    fn claim_teardown(&self) -> Option<ShutdownReason> {
        let reason = self.reason()?;
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(reason)
    }
}

/// What a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub reason: ShutdownReason,
    pub stats: Option<ExportStats>,
}

/// Drives the client from start to teardown.
pub struct ProcessController<'a, C: MessagingClient + ?Sized> {
    client: &'a C,
    config: &'a AppConfig,
    guard: ShutdownGuard,
    board: ProgressBoard,
}

impl<'a, C: MessagingClient + ?Sized> ProcessController<'a, C> {
    pub fn new(client: &'a C, config: &'a AppConfig) -> Self {
        Self {
            client,
            config,
            guard: ShutdownGuard::new(),
            board: ProgressBoard::new(config.ui.progress),
        }
    }

    #[cfg(test)]
    pub const fn guard(&self) -> &ShutdownGuard {
        &self.guard
    }

    /// Start the client, export once it is ready, then tear it down.
    ///
    /// # Errors
    /// Returns error only if the client cannot be started.
    pub async fn run(&self) -> Result<RunOutcome> {
        let mut events = self.client.initialize().await?;
        let mut stats = None;

        while !self.guard.is_triggered() {
            let Some(event) = events.recv().await else {
                self.guard.trigger(ShutdownReason::Disconnected(None));
                break;
            };
            match event {
                ClientEvent::Qr => tracing::info!("QR code available in the client window"),
                ClientEvent::Ready => stats = self.extract(&mut events).await,
                other => {
                    if let Some(reason) = ShutdownReason::from_event(other) {
                        self.guard.trigger(reason);
                    }
                }
            }
        }

        self.shutdown().await;

        Ok(RunOutcome {
            reason: self.guard.reason().unwrap_or(ShutdownReason::Completed),
            stats,
        })
    }

    /// Run the export under the extraction budget, racing the hard timeout
    /// and the client's lifecycle events. Always leaves the guard triggered.
    async fn extract(&self, events: &mut mpsc::Receiver<ClientEvent>) -> Option<ExportStats> {
        let budget = self.config.extract_budget();
        let progress = self
            .board
            .start(budget, format!("Extract ({}s)", budget.as_secs()));
        let deadline = Instant::now() + budget;
        tracing::info!(budget_secs = budget.as_secs(), "Client ready, starting export");

        let board = self.board.clone();
        let orchestrator = match ExportOrchestrator::new(self.client, self.config, board) {
            Ok(orchestrator) => orchestrator,
            Err(e) => {
                tracing::error!(error = %e, "Cannot prepare archive");
                progress.stop();
                self.guard.trigger(ShutdownReason::Completed);
                return None;
            }
        };

        let export = orchestrator.export_all(deadline);
        tokio::pin!(export);
        let hard_timeout = tokio::time::sleep_until(deadline);
        tokio::pin!(hard_timeout);

        let stats = loop {
            tokio::select! {
                biased;
                result = &mut export => {
                    self.guard.trigger(ShutdownReason::Completed);
                    break match result {
                        Ok(stats) => Some(stats),
                        Err(e) => {
                            tracing::error!(error = %e, "Export aborted");
                            None
                        }
                    };
                }
                () = self.guard.triggered() => break None,
                () = &mut hard_timeout => {
                    self.guard.trigger(ShutdownReason::TimedOut);
                    break None;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        if let Some(reason) = ShutdownReason::from_event(event) {
                            self.guard.trigger(reason);
                            break None;
                        }
                    }
                    None => {
                        self.guard.trigger(ShutdownReason::Disconnected(None));
                        break None;
                    }
                },
            }
        };

        progress.stop();
        if stats.is_some() {
            tracing::info!(root = %orchestrator.layout().root().display(), "Archive written");
        }
        stats
    }

    /// Log the reason, then log out and destroy the client, ignoring errors.
    ///
    /// Does nothing unless shutdown was requested, and nothing the second time.
    pub async fn shutdown(&self) -> bool {
        let Some(reason) = self.guard.claim_teardown() else {
            return false;
        };

        tracing::info!("{reason}");

        best_effort("Logout", self.client.logout()).await;
        best_effort("Destroy", self.client.destroy()).await;
        true
    }
}

/// Await one teardown call for at most [`TEARDOWN_TIMEOUT`], logging and
/// dropping any failure.
async fn best_effort(step: &str, call: impl Future<Output = Result<()>>) {
    match tokio::time::timeout(TEARDOWN_TIMEOUT, call).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, "{step} failed"),
        Err(_) => tracing::debug!(
            timeout_secs = TEARDOWN_TIMEOUT.as_secs(),
            "{step} timed out"
        ),
    }
}
