//! # Queue Session
//!
//! One client's view of both partitions. The session owns a cache per
//! partition, exposed through `watch` channels, and keeps it current from
//! three sources:
//!
//! - the lists returned by its own mutations, applied immediately
//! - the change notifier, one subscription per partition
//! - the poll reconciler, one loop per partition
//!
//! All three feed the same [`PartitionState::apply`], so whichever path
//! delivers a read of given store contents the cache ends up the same.
//! Updates from different paths may land out of order; the cache converges
//! on the next refresh.

use crate::config::QueueSettings;
use crate::notifier::{ChangeNotifier, Subscription};
use crate::operations::{BothQueues, PopOutcome, QueueService, RemoveOutcome};
use crate::poller::{PollHandle, PollReconciler};
use crate::reconcile::{OnChange, PartitionUpdate, Reconciler, RefreshSource};
use crate::store::{ChangeFeed, QueueStore};
use crate::{EntryId, QueueEntry, QueueError, QueueResult, QueueType, Timestamp};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;

/// Cached view of one partition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionState {
    /// Ordered entries from the latest refresh, empty after a failed read
    pub entries: Vec<QueueEntry>,
    /// Error from the latest refresh, cleared by the next successful one
    pub last_error: Option<QueueError>,
    pub refreshed_at: Option<Timestamp>,
    pub source: Option<RefreshSource>,
}

impl PartitionState {
    /// Replace the cached list with a refresh outcome
    pub fn apply(&mut self, update: PartitionUpdate) {
        self.source = Some(update.source);
        self.refreshed_at = Some(Timestamp::now());
        match update.result {
            Ok(entries) => {
                self.entries = entries;
                self.last_error = None;
            }
            Err(error) => {
                self.entries = Vec::new();
                self.last_error = Some(error);
            }
        }
    }
}

struct SessionCache {
    main: watch::Sender<PartitionState>,
    waiting_room: watch::Sender<PartitionState>,
    closed: CancellationToken,
}

impl SessionCache {
    fn sender(&self, queue_type: QueueType) -> &watch::Sender<PartitionState> {
        match queue_type {
            QueueType::Main => &self.main,
            QueueType::WaitingRoom => &self.waiting_room,
        }
    }

    fn apply(&self, update: PartitionUpdate) {
        if self.closed.is_cancelled() {
            return;
        }
        if let Err(e) = &update.result {
            warn!(
                queue_type = %update.queue_type,
                source = %update.source,
                error = %e,
                "Refresh failed, showing empty partition"
            );
        }
        self.sender(update.queue_type)
            .send_modify(|state| state.apply(update));
    }

    fn apply_list(&self, queue_type: QueueType, entries: Vec<QueueEntry>) {
        self.apply(PartitionUpdate {
            queue_type,
            source: RefreshSource::Mutation,
            result: Ok(entries),
        });
    }
}

/// A client session over the shared queues
pub struct QueueSession {
    service: QueueService,
    cache: Arc<SessionCache>,
    subscriptions: Mutex<Vec<Subscription>>,
    pollers: Mutex<Vec<PollHandle>>,
}

impl QueueSession {
    /// Start a session over a store that is also its own change feed
    pub async fn open<S>(store: Arc<S>, settings: &QueueSettings) -> Self
    where
        S: QueueStore + ChangeFeed + 'static,
    {
        Self::start(store.clone(), store, settings).await
    }

    /// Subscribe both partitions, load them, and start polling
    ///
    /// A failed initial load leaves the partition empty with its error
    /// recorded; the poll loop retries on its own.
    #[instrument(skip_all)]
    pub async fn start(
        store: Arc<dyn QueueStore>,
        feed: Arc<dyn ChangeFeed>,
        settings: &QueueSettings,
    ) -> Self {
        let service = QueueService::new(store.clone(), settings.allocation);
        let reconciler = Reconciler::new(store);
        let cache = Arc::new(SessionCache {
            main: watch::Sender::new(PartitionState::default()),
            waiting_room: watch::Sender::new(PartitionState::default()),
            closed: CancellationToken::new(),
        });

        let notifier = ChangeNotifier::new(feed, reconciler.clone());
        let poller = PollReconciler::new(reconciler.clone());
        let mut subscriptions = Vec::with_capacity(QueueType::ALL.len());
        let mut pollers = Vec::with_capacity(QueueType::ALL.len());

        // Subscribe before loading so no change between the two is lost
        for queue_type in QueueType::ALL {
            subscriptions.push(notifier.subscribe(queue_type, Self::on_change(&cache)));
        }

        for queue_type in QueueType::ALL {
            cache.apply(reconciler.update(queue_type, RefreshSource::Initial).await);
        }

        for queue_type in QueueType::ALL {
            pollers.push(poller.start(
                queue_type,
                Self::on_change(&cache),
                settings.poll_interval(),
            ));
        }

        info!(
            poll_interval_ms = settings.poll_interval_ms,
            allocation = ?settings.allocation,
            "Queue session started"
        );

        Self {
            service,
            cache,
            subscriptions: Mutex::new(subscriptions),
            pollers: Mutex::new(pollers),
        }
    }

    fn on_change(cache: &Arc<SessionCache>) -> OnChange {
        let cache = cache.clone();
        Arc::new(move |update| cache.apply(update))
    }

    pub fn service(&self) -> &QueueService {
        &self.service
    }

    /// Receiver for the cached state of `queue_type`
    pub fn watch(&self, queue_type: QueueType) -> watch::Receiver<PartitionState> {
        self.cache.sender(queue_type).subscribe()
    }

    /// Current cached state of `queue_type`
    pub fn snapshot(&self, queue_type: QueueType) -> PartitionState {
        self.cache.sender(queue_type).borrow().clone()
    }

    /// Current cached entries of `queue_type`
    pub fn entries(&self, queue_type: QueueType) -> Vec<QueueEntry> {
        self.cache.sender(queue_type).borrow().entries.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.cache.closed.is_cancelled()
    }

    // ========================================================================
    // Mutations
    // ========================================================================
    //
    // A successful mutation replaces the affected cache(s) with the list it
    // returned. A failed one leaves the cache as it was.

    pub async fn push(
        &self,
        queue_type: QueueType,
        value1: String,
        value2: String,
    ) -> QueueResult<Vec<QueueEntry>> {
        let entries = self.service.push(queue_type, value1, value2).await?;
        self.cache.apply_list(queue_type, entries.clone());
        Ok(entries)
    }

    pub async fn pop(&self, queue_type: QueueType) -> QueueResult<PopOutcome> {
        let outcome = self.service.pop(queue_type).await?;
        self.cache.apply_list(queue_type, outcome.entries.clone());
        Ok(outcome)
    }

    pub async fn remove_by_id(&self, id: &EntryId) -> QueueResult<RemoveOutcome> {
        let outcome = self.service.remove_by_id(id).await?;
        self.cache
            .apply_list(outcome.queue_type, outcome.entries.clone());
        Ok(outcome)
    }

    pub async fn move_to_waiting_room(&self, id: &EntryId) -> QueueResult<BothQueues> {
        let both = self.service.move_to_waiting_room(id).await?;
        self.cache.apply_list(QueueType::Main, both.main.clone());
        self.cache
            .apply_list(QueueType::WaitingRoom, both.waiting_room.clone());
        Ok(both)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Stop every background task
    ///
    /// Once this returns the cache never changes again.
    pub async fn shutdown(&self) {
        self.cache.closed.cancel();

        let subscriptions = std::mem::take(&mut *self.subscriptions.lock().await);
        for subscription in subscriptions {
            subscription.unsubscribe().await;
        }

        let pollers = std::mem::take(&mut *self.pollers.lock().await);
        for poller in pollers {
            poller.stop().await;
        }

        info!("Queue session stopped");
    }
}

impl Drop for QueueSession {
    fn drop(&mut self) {
        self.cache.closed.cancel();
    }
}
