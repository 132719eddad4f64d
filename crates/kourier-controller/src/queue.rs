//! Deduplicating work queue.
//!
//! Keys are level-triggered notifications: adding a key that is already
//! pending is a no-op, and a key added while a worker processes it is
//! queued again once that worker calls [`WorkQueue::done`]. A key is
//! therefore never handed to two workers at the same time.
//!
//! ```text
//! add(k) ──► dirty ∪ {k} ──► queue ──get()──► processing ──done(k)──┐
//!              ▲                                                    │
//!              └──────────── requeued if k was added meanwhile ◄────┘
//! ```
//!
//! Failed keys are retried with exponential backoff until the retry
//! ceiling is reached.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::trace;

/// Backoff and retry settings of a [`WorkQueue`].
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound of the retry delay.
    pub max_delay: Duration,
    /// Failures after which a key is dropped.
    pub max_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(30),
            max_retries: 10,
        }
    }
}

impl QueueConfig {
    /// Delay before retry number `attempt` (starting at 1).
    ///
    /// Doubles with every attempt, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// What happened to a failed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// The key will be added again after `delay`.
    Scheduled {
        /// Consecutive failures so far.
        attempt: u32,
        /// Delay before the key is queued again.
        delay: Duration,
    },
    /// The key reached the retry ceiling and was dropped.
    Exhausted {
        /// Total failures.
        attempts: u32,
    },
}

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<String>,
    dirty: HashSet<String>,
    processing: HashSet<String>,
    failures: HashMap<String, u32>,
    shutting_down: bool,
}

#[derive(Debug)]
struct QueueInner {
    state: Mutex<QueueState>,
    notify: Notify,
    config: QueueConfig,
}

/// Deduplicating work queue shared by producers and workers.
///
/// # Example
///
/// ```rust
/// use kourier_controller::WorkQueue;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let queue = WorkQueue::default();
/// queue.add("ingress");
/// queue.add("ingress");
/// assert_eq!(queue.len(), 1);
///
/// let key = queue.get().await.unwrap();
/// // ... reconcile ...
/// queue.done(&key);
/// assert!(queue.is_empty());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WorkQueue {
    inner: Arc<QueueInner>,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl WorkQueue {
    /// Create an empty queue.
    pub fn new(config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                notify: Notify::new(),
                config,
            }),
        }
    }

    /// The queue configuration.
    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Mark `key` as needing work.
    ///
    /// Collapses into an already pending entry for the same key. Ignored
    /// once the queue is shutting down.
    pub fn add(&self, key: impl Into<String>) {
        let key = key.into();
        let mut state = self.inner.state.lock();
        if state.shutting_down {
            return;
        }
        counter!("kourier_queue_adds_total").increment(1);
        if !state.dirty.insert(key.clone()) {
            trace!(key = %key, "key already pending");
            return;
        }
        if state.processing.contains(&key) {
            // queued again by done()
            return;
        }
        state.queue.push_back(key);
        gauge!("kourier_queue_depth").set(state.queue.len() as f64);
        drop(state);
        self.inner.notify.notify_one();
    }

    /// Add `key` once `delay` has elapsed.
    ///
    /// Must be called within a tokio runtime.
    pub fn add_after(&self, key: impl Into<String>, delay: Duration) {
        let key = key.into();
        if delay.is_zero() {
            self.add(key);
            return;
        }
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Wait for the next key.
    ///
    /// The key is handed to exactly one caller and stays in processing
    /// until [`done`](Self::done). Returns `None` once the queue is shut
    /// down.
    pub async fn get(&self) -> Option<String> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // register before looking so a concurrent shutdown is not missed
            notified.as_mut().enable();

            {
                let mut state = self.inner.state.lock();
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    gauge!("kourier_queue_depth").set(state.queue.len() as f64);
                    let more = !state.queue.is_empty();
                    drop(state);
                    if more {
                        self.inner.notify.notify_one();
                    }
                    return Some(key);
                }
            }

            notified.await;
        }
    }

    /// Finish processing `key`.
    ///
    /// If the key was added again in the meantime it goes back on the
    /// queue.
    pub fn done(&self, key: &str) {
        let mut state = self.inner.state.lock();
        state.processing.remove(key);
        if state.dirty.contains(key) && !state.shutting_down {
            state.queue.push_back(key.to_string());
            gauge!("kourier_queue_depth").set(state.queue.len() as f64);
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    /// Record a failure of `key` and schedule a retry with backoff.
    ///
    /// Past the retry ceiling the key's history is cleared and it is not
    /// scheduled again.
    pub fn retry(&self, key: &str) -> Retry {
        let attempt = {
            let mut state = self.inner.state.lock();
            let failures = state.failures.entry(key.to_string()).or_default();
            *failures += 1;
            let attempt = *failures;
            if attempt > self.inner.config.max_retries {
                state.failures.remove(key);
                return Retry::Exhausted { attempts: attempt };
            }
            attempt
        };

        counter!("kourier_queue_retries_total").increment(1);
        let delay = self.inner.config.backoff(attempt);
        self.add_after(key, delay);
        Retry::Scheduled { attempt, delay }
    }

    /// Clear the failure history of `key`.
    pub fn forget(&self, key: &str) {
        self.inner.state.lock().failures.remove(key);
    }

    /// Consecutive failures recorded for `key`.
    pub fn failures(&self, key: &str) -> u32 {
        self.inner
            .state
            .lock()
            .failures
            .get(key)
            .copied()
            .unwrap_or_default()
    }

    /// Stop handing out keys and wake every waiting worker.
    pub fn shut_down(&self) {
        self.inner.state.lock().shutting_down = true;
        self.inner.notify.notify_waiters();
    }

    /// Whether [`shut_down`](Self::shut_down) was called.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.state.lock().shutting_down
    }

    /// Number of keys waiting to be handed out.
    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Whether no key is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys currently being processed.
    pub fn processing(&self) -> usize {
        self.inner.state.lock().processing.len()
    }
}
