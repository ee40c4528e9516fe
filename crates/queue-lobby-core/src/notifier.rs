//! # Change Notifier
//!
//! Push channel scoped to one partition. Every signal from the change feed
//! triggers a full re-fetch of the partition; event payloads are never
//! applied as diffs. A receiver that lagged behind is treated as one more
//! change, since a re-fetch covers whatever it missed.
//!
//! Each subscription runs as its own task and stops on cancellation or when
//! the feed closes. [`Subscription::unsubscribe`] waits for the task to end,
//! so no callback fires once it returns.

use crate::reconcile::{OnChange, Reconciler, RefreshSource};
use crate::store::{ChangeFeed, ChangeSignal};
use crate::QueueType;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "notifier_tests.rs"]
mod tests;

/// Subscribes callbacks to partition changes
#[derive(Clone)]
pub struct ChangeNotifier {
    feed: Arc<dyn ChangeFeed>,
    reconciler: Reconciler,
}

impl ChangeNotifier {
    pub fn new(feed: Arc<dyn ChangeFeed>, reconciler: Reconciler) -> Self {
        Self { feed, reconciler }
    }

    /// Invoke `on_change` with a fresh read of `queue_type` after every change
    ///
    /// The feed receiver is registered before this returns, so mutations made
    /// afterwards are never missed. Must be called within a tokio runtime.
    pub fn subscribe(&self, queue_type: QueueType, on_change: OnChange) -> Subscription {
        let mut feed = self.feed.subscribe(queue_type);
        let reconciler = self.reconciler.clone();
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let task = tokio::spawn(async move {
            info!(queue_type = %queue_type, "Change subscription started");
            loop {
                let signal = tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    signal = feed.recv() => signal,
                };

                match signal {
                    Some(ChangeSignal::Changed(event)) => {
                        debug!(
                            queue_type = %queue_type,
                            entry_id = %event.entry_id,
                            kind = ?event.kind,
                            "Change received"
                        );
                    }
                    Some(ChangeSignal::Lagged(skipped)) => {
                        warn!(queue_type = %queue_type, skipped = skipped, "Change feed lagged, re-fetching");
                    }
                    None => {
                        warn!(queue_type = %queue_type, "Change feed closed");
                        break;
                    }
                }

                let update = tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    update = reconciler.update(queue_type, RefreshSource::Notification) => update,
                };

                if cancelled.is_cancelled() {
                    break;
                }
                on_change(update);
            }
            info!(queue_type = %queue_type, "Change subscription stopped");
        });

        Subscription {
            queue_type,
            token,
            task: Some(task),
        }
    }
}

/// Handle to a running change subscription
///
/// Dropping the handle cancels the subscription without waiting for it.
pub struct Subscription {
    queue_type: QueueType,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    /// Whether the listener task is still running
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
            && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Request cancellation without waiting
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel and wait for the listener task to finish
    pub async fn unsubscribe(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!(queue_type = %self.queue_type, "Change subscription panicked");
                }
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
