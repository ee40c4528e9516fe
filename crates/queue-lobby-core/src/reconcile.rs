//! # Reconciliation
//!
//! The single refresh routine behind both reconciliation channels. A refresh
//! is a full ordered read of one partition; it holds no state of its own, so
//! calling it from the change notifier or from a poll tick against the same
//! store contents yields the same list.

use crate::store::QueueStore;
use crate::{QueueEntry, QueueError, QueueResult, QueueType};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;

/// What triggered a partition refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshSource {
    Initial,
    Notification,
    Poll,
    Mutation,
}

impl fmt::Display for RefreshSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initial => "initial",
            Self::Notification => "notification",
            Self::Poll => "poll",
            Self::Mutation => "mutation",
        };
        f.write_str(name)
    }
}

/// Outcome of one refresh, delivered to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionUpdate {
    pub queue_type: QueueType,
    pub source: RefreshSource,
    pub result: Result<Vec<QueueEntry>, QueueError>,
}

/// Callback invoked with every refresh outcome
pub type OnChange = Arc<dyn Fn(PartitionUpdate) + Send + Sync>;

/// Idempotent partition refresh
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn QueueStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self { store }
    }

    /// Full ordered read of `queue_type`
    #[instrument(skip(self), fields(queue_type = %queue_type))]
    pub async fn refresh(&self, queue_type: QueueType) -> QueueResult<Vec<QueueEntry>> {
        match self.store.list(queue_type).await {
            Ok(entries) => {
                debug!(count = entries.len(), "Refreshed partition");
                Ok(entries)
            }
            Err(e) => {
                warn!(error = %e, "Partition refresh failed");
                Err(e.into())
            }
        }
    }

    /// Refresh and wrap the outcome for delivery
    pub async fn update(&self, queue_type: QueueType, source: RefreshSource) -> PartitionUpdate {
        PartitionUpdate {
            queue_type,
            source,
            result: self.refresh(queue_type).await,
        }
    }
}
