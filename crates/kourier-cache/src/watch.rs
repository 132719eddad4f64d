//! Watch subscriptions for snapshot updates.
//!
//! A [`Watch`] follows the published snapshot of one node. It always
//! yields the latest snapshot: intermediate versions published while the
//! watcher was busy are skipped, never reordered. Dropping the watch
//! removes it from the node's fan-out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use kourier_core::NodeHash;
use tokio::sync::watch;

use crate::{CacheStats, Snapshot};

/// Unique identifier for a watch subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

impl WatchId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric value of this watch ID.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for WatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "watch-{}", self.0)
    }
}

/// A subscription to the published snapshot of one node.
#[derive(Debug)]
pub struct Watch {
    id: WatchId,
    node_hash: NodeHash,
    receiver: watch::Receiver<Option<Arc<Snapshot>>>,
    stats: Arc<CacheStats>,
}

impl Watch {
    pub(crate) fn new(
        node_hash: NodeHash,
        receiver: watch::Receiver<Option<Arc<Snapshot>>>,
        stats: Arc<CacheStats>,
    ) -> Self {
        stats.watch_opened();
        Self {
            id: WatchId::next(),
            node_hash,
            receiver,
            stats,
        }
    }

    /// Get the unique identifier for this watch.
    #[inline]
    pub fn id(&self) -> WatchId {
        self.id
    }

    /// Get the node hash this watch is subscribed to.
    #[inline]
    pub fn node_hash(&self) -> NodeHash {
        self.node_hash
    }

    /// The currently published snapshot, marking it as seen.
    pub fn current(&mut self) -> Option<Arc<Snapshot>> {
        self.receiver.borrow_and_update().clone()
    }

    /// Wait for a snapshot newer than the last one seen.
    ///
    /// Returns `None` once the cache has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<Snapshot>> {
        loop {
            self.receiver.changed().await.ok()?;
            // A cleared snapshot publishes `None`; keep waiting for content.
            if let Some(snapshot) = self.receiver.borrow_and_update().clone() {
                return Some(snapshot);
            }
        }
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        self.stats.watch_closed();
    }
}
