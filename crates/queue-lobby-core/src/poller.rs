//! # Poll Reconciler
//!
//! Periodic full re-fetch of a partition, run alongside the change notifier
//! to bound staleness when change events go missing. Ticks never overlap:
//! each fetch completes before the next tick is awaited, and ticks missed
//! during a slow fetch are skipped rather than burst.

use crate::reconcile::{OnChange, Reconciler, RefreshSource};
use crate::QueueType;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;

/// Starts poll loops over a reconciler
#[derive(Clone)]
pub struct PollReconciler {
    reconciler: Reconciler,
}

impl PollReconciler {
    pub fn new(reconciler: Reconciler) -> Self {
        Self { reconciler }
    }

    /// Re-fetch `queue_type` every `interval` and hand the result to `on_change`
    ///
    /// The first fetch happens one interval after start. A zero interval is
    /// raised to one millisecond.
    pub fn start(&self, queue_type: QueueType, on_change: OnChange, interval: Duration) -> PollHandle {
        let period = interval.max(Duration::from_millis(1));
        let reconciler = self.reconciler.clone();
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let task = tokio::spawn(async move {
            info!(queue_type = %queue_type, interval_ms = period.as_millis() as u64, "Polling started");
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let update = tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    update = reconciler.update(queue_type, RefreshSource::Poll) => update,
                };

                if cancelled.is_cancelled() {
                    break;
                }
                debug!(queue_type = %queue_type, ok = update.result.is_ok(), "Poll tick");
                on_change(update);
            }
            info!(queue_type = %queue_type, "Polling stopped");
        });

        PollHandle {
            queue_type,
            token,
            task: Some(task),
        }
    }
}

/// Handle to a running poll loop
///
/// Dropping the handle cancels the loop without waiting for it.
pub struct PollHandle {
    queue_type: QueueType,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
            && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Request cancellation without waiting
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel and wait for the loop to exit
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!(queue_type = %self.queue_type, "Poll loop panicked");
                }
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
