//! Cache trait and [`SnapshotCache`] implementation.
//!
//! The cache stores the latest published snapshot per node. Each node has
//! its own slot:
//!
//! - a writer lock serializing publications and owning the version counter
//! - an `ArcSwapOption` holding the current snapshot, read without locking
//! - a `watch` channel fanning the current snapshot out to open streams
//!
//! Publishing is idempotent: a snapshot whose content equals the current
//! one is not stored, does not bump the version, and wakes no watcher.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use kourier_core::{NodeHash, ResourceType, ResourceVersion};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::snapshot::Snapshot;
use crate::stats::CacheStats;
use crate::watch::Watch;

/// Result of publishing a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    /// Content matched the current snapshot; nothing was published.
    Unchanged {
        /// The version still in effect.
        version: ResourceVersion,
    },
    /// A new version was published.
    Updated {
        /// The version just issued.
        version: ResourceVersion,
        /// The version that was in effect before, empty if none.
        previous: ResourceVersion,
        /// Resource types whose content changed, in push order.
        changed: Vec<ResourceType>,
    },
}

impl SetOutcome {
    /// The version in effect after the call.
    pub fn version(&self) -> ResourceVersion {
        match self {
            Self::Unchanged { version } | Self::Updated { version, .. } => *version,
        }
    }

    /// Whether a new version was published.
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}

/// Trait for snapshot caches.
pub trait Cache: Send + Sync {
    /// Get the latest snapshot for a node.
    fn get_snapshot(&self, node: NodeHash) -> Option<Arc<Snapshot>>;

    /// Publish a snapshot for a node.
    ///
    /// Versions are assigned here. Watches are notified only when the
    /// content changed.
    fn set_snapshot(&self, node: NodeHash, snapshot: Snapshot) -> SetOutcome;

    /// Clear the snapshot for a node. Later versions keep increasing.
    fn clear_snapshot(&self, node: NodeHash);

    /// Get the number of nodes with a published snapshot.
    fn snapshot_count(&self) -> usize;

    /// Subscribe to publications for a node.
    fn watch(&self, node: NodeHash) -> Watch;
}

/// Per-node state.
#[derive(Debug)]
struct NodeSlot {
    /// Last issued version; held for the whole publication.
    writer: Mutex<ResourceVersion>,
    current: ArcSwapOption<Snapshot>,
    notifier: watch::Sender<Option<Arc<Snapshot>>>,
}

impl NodeSlot {
    fn new(version_base: ResourceVersion) -> Self {
        let (notifier, _) = watch::channel(None);
        Self {
            writer: Mutex::new(version_base),
            current: ArcSwapOption::empty(),
            notifier,
        }
    }
}

/// Versioned per-node snapshot cache.
///
/// ## Thread Safety
///
/// Writers to the same node are serialized by that node's lock; writers to
/// different nodes never contend. Readers load an `Arc` through
/// `ArcSwapOption` and never wait on a writer.
///
/// ## Example
///
/// ```rust
/// use kourier_cache::{Cache, Snapshot, SnapshotCache};
/// use kourier_core::NodeHash;
///
/// let cache = SnapshotCache::new();
/// let node = NodeHash::from_id("gateway");
///
/// let first = cache.set_snapshot(node, Snapshot::builder().build());
/// assert!(first.is_updated());
///
/// // Same content: no new version.
/// let again = cache.set_snapshot(node, Snapshot::builder().build());
/// assert!(!again.is_updated());
/// assert_eq!(first.version(), again.version());
/// ```
#[derive(Debug)]
pub struct SnapshotCache {
    nodes: DashMap<NodeHash, Arc<NodeSlot>>,
    version_base: ResourceVersion,
    stats: Arc<CacheStats>,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCache {
    /// Create a cache whose first issued version is `1`.
    pub fn new() -> Self {
        Self::with_version_base(0)
    }

    /// Create a cache whose first issued version is `base + 1`.
    ///
    /// Seeding the base from wall-clock time makes versions issued after a
    /// restart exceed the ones a reconnecting proxy still holds.
    pub fn with_version_base(base: u64) -> Self {
        Self {
            nodes: DashMap::with_capacity(4),
            version_base: ResourceVersion::new(base),
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Get cache statistics.
    #[inline]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Get all nodes with a published snapshot.
    pub fn nodes(&self) -> Vec<NodeHash> {
        self.nodes
            .iter()
            .filter(|r| r.value().current.load().is_some())
            .map(|r| *r.key())
            .collect()
    }

    /// Check if a snapshot exists for a node.
    pub fn has_snapshot(&self, node: NodeHash) -> bool {
        self.nodes
            .get(&node)
            .is_some_and(|slot| slot.current.load().is_some())
    }

    fn slot(&self, node: NodeHash) -> Arc<NodeSlot> {
        if let Some(slot) = self.nodes.get(&node) {
            return Arc::clone(slot.value());
        }
        let base = self.version_base;
        Arc::clone(
            self.nodes
                .entry(node)
                .or_insert_with(|| Arc::new(NodeSlot::new(base)))
                .value(),
        )
    }
}

impl Cache for SnapshotCache {
    fn get_snapshot(&self, node: NodeHash) -> Option<Arc<Snapshot>> {
        // Clone the slot and drop the map guard before loading.
        let slot = self.nodes.get(&node).map(|r| Arc::clone(&*r));
        let result = slot.and_then(|slot| slot.current.load_full());

        if result.is_some() {
            self.stats.record_hit();
            trace!(node = %node, "cache hit");
        } else {
            self.stats.record_miss();
            trace!(node = %node, "cache miss");
        }

        result
    }

    fn set_snapshot(&self, node: NodeHash, snapshot: Snapshot) -> SetOutcome {
        let slot = self.slot(node);
        let mut last_issued = slot.writer.lock();

        let previous = slot.current.load_full();
        let changed = match previous.as_deref() {
            Some(prev) => snapshot.changed_types(prev),
            None => ResourceType::ALL.to_vec(),
        };

        if let (Some(prev), true) = (previous.as_deref(), changed.is_empty()) {
            self.stats.record_unchanged();
            trace!(node = %node, version = %prev.version(), "snapshot unchanged");
            return SetOutcome::Unchanged {
                version: prev.version(),
            };
        }

        let version = last_issued.next();
        *last_issued = version;

        let published = Arc::new(snapshot.stamp(previous.as_deref(), version, &changed));
        slot.current.store(Some(Arc::clone(&published)));
        let receivers = slot.notifier.receiver_count();
        slot.notifier.send_replace(Some(Arc::clone(&published)));

        self.stats.record_set();
        self.stats.record_notifications(receivers as u64);

        debug!(
            node = %node,
            version = %version,
            changed = ?changed,
            resources = published.total_resources(),
            watchers = receivers,
            "set snapshot"
        );

        SetOutcome::Updated {
            version,
            previous: previous.map(|p| p.version()).unwrap_or_default(),
            changed,
        }
    }

    fn clear_snapshot(&self, node: NodeHash) {
        let Some(slot) = self.nodes.get(&node).map(|r| Arc::clone(&*r)) else {
            return;
        };
        let _writer = slot.writer.lock();
        if slot.current.swap(None).is_some() {
            slot.notifier.send_replace(None);
            self.stats.record_clear();
            debug!(node = %node, "cleared snapshot");
        }
    }

    fn snapshot_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|r| r.value().current.load().is_some())
            .count()
    }

    fn watch(&self, node: NodeHash) -> Watch {
        let slot = self.slot(node);
        Watch::new(node, slot.notifier.subscribe(), Arc::clone(&self.stats))
    }
}
