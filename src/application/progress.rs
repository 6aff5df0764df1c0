//! Textual countdown bars.
//!
//! Purely cosmetic: the ticking task only redraws the bar and never feeds
//! back into the work it is timing. All bars of a run share one
//! [`ProgressBoard`], so concurrent bars get their own lines.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const TEMPLATE: &str = "{prefix} [{bar:40}] {percent}% {msg}";
const TICK: Duration = Duration::from_secs(1);

/// Whole seconds left of `total` after `elapsed`, rounded up.
#[must_use]
pub fn remaining_secs(elapsed: Duration, total: Duration) -> u64 {
    let left = total.saturating_sub(elapsed).as_millis();
    u64::try_from(left.div_ceil(1000)).unwrap_or(u64::MAX)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Terminal area shared by every bar of a run.
#[derive(Clone)]
pub struct ProgressBoard {
    multi: Option<MultiProgress>,
}

impl ProgressBoard {
    /// A board that draws, or one that hands out inert handles.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        if enabled {
            Self::with_multi(MultiProgress::new())
        } else {
            Self::disabled()
        }
    }

    #[must_use]
    pub const fn disabled() -> Self {
        Self { multi: None }
    }

    const fn with_multi(multi: MultiProgress) -> Self {
        Self { multi: Some(multi) }
    }

    /// Add a countdown bar on its own line, ticking once per second.
    #[must_use]
    pub fn start(&self, total: Duration, label: impl Into<String>) -> ProgressHandle {
        let Some(multi) = &self.multi else {
            return ProgressHandle::inert();
        };
        let bar = ProgressBar::new(millis(total))
            .with_style(bar_style())
            .with_prefix(label.into());
        ProgressHandle::drive(multi.add(bar), total)
    }
}

/// Running progress bar. Stops on [`ProgressHandle::stop`] or on drop.
pub struct ProgressHandle {
    bar: Option<ProgressBar>,
    token: CancellationToken,
    stopped: AtomicBool,
}

impl ProgressHandle {
    /// A handle that draws nothing.
    #[must_use]
    pub fn inert() -> Self {
        Self {
            bar: None,
            token: CancellationToken::new(),
            stopped: AtomicBool::new(false),
        }
    }

    fn drive(bar: ProgressBar, total: Duration) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let ticking = bar.clone();
        let start = Instant::now();
        bar.set_message(format!("{}s", remaining_secs(Duration::ZERO, total)));

        tokio::spawn(async move {
            let mut ticker = interval_at(start + TICK, TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let elapsed = start.elapsed();
                        ticking.set_position(millis(elapsed.min(total)));
                        ticking.set_message(format!("{}s", remaining_secs(elapsed, total)));
                    }
                }
            }
        });

        Self {
            bar: Some(bar),
            token,
            stopped: AtomicBool::new(false),
        }
    }

    /// Cancel the tick and clear the line. Only the first call has effect.
    ///
    /// Returns whether this call performed the stop.
    pub fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.token.cancel();
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
        true
    }
}

impl Drop for ProgressHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
