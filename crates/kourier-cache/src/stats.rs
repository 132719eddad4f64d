//! Cache counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy)]
#[repr(usize)]
enum Counter {
    Published,
    Unchanged,
    Hits,
    Misses,
    Cleared,
    Notifications,
    Watches,
}

const COUNTERS: usize = Counter::Watches as usize + 1;

/// Counters describing how the cache is used.
///
/// Publication counters let an operator tell real configuration churn
/// (`snapshots_set`) apart from reconciliations that found nothing to change
/// (`snapshots_unchanged`).
#[derive(Debug, Default)]
pub struct CacheStats {
    counters: [AtomicU64; COUNTERS],
}

impl CacheStats {
    /// Zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn add(&self, counter: Counter, n: u64) {
        self.counters[counter as usize].fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    fn get(&self, counter: Counter) -> u64 {
        self.counters[counter as usize].load(Ordering::Relaxed)
    }

    pub(crate) fn record_set(&self) {
        self.add(Counter::Published, 1);
    }

    pub(crate) fn record_unchanged(&self) {
        self.add(Counter::Unchanged, 1);
    }

    pub(crate) fn record_hit(&self) {
        self.add(Counter::Hits, 1);
    }

    pub(crate) fn record_miss(&self) {
        self.add(Counter::Misses, 1);
    }

    pub(crate) fn record_clear(&self) {
        self.add(Counter::Cleared, 1);
    }

    pub(crate) fn record_notifications(&self, count: u64) {
        self.add(Counter::Notifications, count);
    }

    pub(crate) fn watch_opened(&self) {
        self.add(Counter::Watches, 1);
    }

    pub(crate) fn watch_closed(&self) {
        self.counters[Counter::Watches as usize].fetch_sub(1, Ordering::Relaxed);
    }

    /// Publications that issued a new version.
    pub fn snapshots_set(&self) -> u64 {
        self.get(Counter::Published)
    }

    /// Publications skipped because the content matched.
    pub fn snapshots_unchanged(&self) -> u64 {
        self.get(Counter::Unchanged)
    }

    /// Lookups that found a snapshot.
    pub fn snapshot_hits(&self) -> u64 {
        self.get(Counter::Hits)
    }

    /// Lookups for a node with nothing published.
    pub fn snapshot_misses(&self) -> u64 {
        self.get(Counter::Misses)
    }

    /// Snapshots removed.
    pub fn snapshots_cleared(&self) -> u64 {
        self.get(Counter::Cleared)
    }

    /// Publications delivered to watches, summed over watches.
    pub fn notifications_sent(&self) -> u64 {
        self.get(Counter::Notifications)
    }

    /// Watches currently open.
    pub fn active_watches(&self) -> u64 {
        self.get(Counter::Watches)
    }
}
