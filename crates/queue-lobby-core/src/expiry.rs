//! # Expiry Overlay
//!
//! Display-only countdown for entries sitting in the waiting room.
//!
//! [`evaluate`] is a pure function of `(moved_at, now, duration)`.
//! [`ExpiryTicker`] is the scheduling wrapper that re-evaluates it at a fixed
//! cadence and publishes the result through a `watch` channel. Nothing here
//! ever removes or changes an entry; an expired entry stays queryable and
//! poppable.

use crate::config::QueueSettings;
use crate::{QueueEntry, Timestamp};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[cfg(test)]
#[path = "expiry_tests.rs"]
mod tests;

// ============================================================================
// Clock
// ============================================================================

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

// ============================================================================
// Status
// ============================================================================

/// Display state of an entry's countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryStatus {
    /// No `moved_at`, nothing to show
    Hidden,
    Counting { remaining: Duration },
    Expired,
}

impl ExpiryStatus {
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }

    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Self::Counting { remaining } => Some(*remaining),
            _ => None,
        }
    }
}

/// `mm:ss` while counting (whole seconds, truncated), `EXPIRED` once
/// expired, empty when hidden
impl fmt::Display for ExpiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hidden => Ok(()),
            Self::Expired => f.write_str("EXPIRED"),
            Self::Counting { remaining } => {
                let secs = remaining.as_secs();
                write!(f, "{:02}:{:02}", secs / 60, secs % 60)
            }
        }
    }
}

/// Countdown state at `now` for an entry moved at `moved_at`
///
/// Expired for every `now >= moved_at + duration`.
pub fn evaluate(moved_at: Option<Timestamp>, now: Timestamp, duration: Duration) -> ExpiryStatus {
    let Some(moved_at) = moved_at else {
        return ExpiryStatus::Hidden;
    };

    let deadline = moved_at.add_duration(duration);
    if now >= deadline {
        ExpiryStatus::Expired
    } else {
        ExpiryStatus::Counting {
            remaining: deadline.duration_since(now),
        }
    }
}

// ============================================================================
// Ticker
// ============================================================================

/// Re-evaluates one entry's countdown every `refresh`
///
/// Stops by itself once the status leaves `Counting`.
pub struct ExpiryTicker {
    status: watch::Receiver<ExpiryStatus>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ExpiryTicker {
    /// Ticker for `entry` using the configured expiry duration and cadence
    pub fn for_entry(entry: &QueueEntry, settings: &QueueSettings, clock: Arc<dyn Clock>) -> Self {
        Self::start(
            entry.moved_at,
            settings.expiry_duration(),
            settings.expiry_refresh(),
            clock,
        )
    }

    pub fn start(
        moved_at: Option<Timestamp>,
        duration: Duration,
        refresh: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let initial = evaluate(moved_at, clock.now(), duration);
        let (tx, status) = watch::channel(initial);
        let token = CancellationToken::new();

        if !matches!(initial, ExpiryStatus::Counting { .. }) {
            return Self {
                status,
                token,
                task: None,
            };
        }

        let period = refresh.max(Duration::from_millis(1));
        let cancelled = token.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let next = evaluate(moved_at, clock.now(), duration);
                tx.send_replace(next);
                if !matches!(next, ExpiryStatus::Counting { .. }) {
                    debug!("Expiry countdown finished");
                    break;
                }
            }
        });

        Self {
            status,
            token,
            task: Some(task),
        }
    }

    /// Latest published status
    pub fn status(&self) -> ExpiryStatus {
        *self.status.borrow()
    }

    /// Receiver notified on every re-evaluation
    pub fn subscribe(&self) -> watch::Receiver<ExpiryStatus> {
        self.status.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
            && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancel and wait for the ticker task to exit
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ExpiryTicker {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
