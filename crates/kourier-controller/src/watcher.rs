//! Sources of routing rules and backends.
//!
//! The controller pulls the complete current state from a
//! [`ResourceWatcher`] on every reconciliation; it never applies partial
//! updates. Watchers only tell the controller *that* something changed by
//! adding a key to the [`WorkQueue`].

use std::ffi::OsStr;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kourier_core::{KourierError, Result};
use notify::{PollWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::model::{Backend, ClusterState, ObjectKey, RouteRule};
use crate::queue::WorkQueue;

/// Full-pull view of the routing rules and backends.
#[async_trait]
pub trait ResourceWatcher: Send + Sync + std::fmt::Debug {
    /// Every current routing rule.
    async fn route_rules(&self) -> Result<Vec<RouteRule>>;

    /// Every current backend with its endpoints.
    async fn backends(&self) -> Result<Vec<Backend>>;

    /// Rules and backends together.
    ///
    /// Watchers able to read both consistently should override this.
    async fn current_state(&self) -> Result<ClusterState> {
        Ok(ClusterState {
            rules: self.route_rules().await?,
            backends: self.backends().await?,
        })
    }
}

/// Watcher backed by in-process state.
///
/// # Example
///
/// ```rust
/// use kourier_controller::{Backend, InMemoryWatcher, ResourceWatcher, RouteRule};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let watcher = InMemoryWatcher::new();
/// watcher.upsert_backend(Backend::new("default", "hello"));
///
/// assert_eq!(watcher.backends().await.unwrap().len(), 1);
/// assert!(watcher.route_rules().await.unwrap().is_empty());
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryWatcher {
    state: RwLock<ClusterState>,
    unavailable: AtomicBool,
}

impl InMemoryWatcher {
    /// Create an empty watcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a watcher holding `state`.
    pub fn with_state(state: ClusterState) -> Self {
        Self {
            state: RwLock::new(state),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Replace the whole state.
    pub fn replace(&self, state: ClusterState) {
        *self.state.write() = state;
    }

    /// Insert a rule or replace the rule with the same identity.
    pub fn upsert_rule(&self, rule: RouteRule) {
        let mut state = self.state.write();
        let key = rule.key();
        state.rules.retain(|r| r.key() != key);
        state.rules.push(rule);
    }

    /// Remove a rule.
    pub fn remove_rule(&self, key: &ObjectKey) {
        self.state.write().rules.retain(|r| &r.key() != key);
    }

    /// Insert a backend or replace the backend with the same identity.
    pub fn upsert_backend(&self, backend: Backend) {
        let mut state = self.state.write();
        let key = backend.key();
        state.backends.retain(|b| b.key() != key);
        state.backends.push(backend);
    }

    /// Remove a backend.
    pub fn remove_backend(&self, key: &ObjectKey) {
        self.state.write().backends.retain(|b| &b.key() != key);
    }

    /// Make every read fail as if the underlying store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(KourierError::TransientInput {
                message: "in-memory store marked unavailable".to_string(),
                source: None,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceWatcher for InMemoryWatcher {
    async fn route_rules(&self) -> Result<Vec<RouteRule>> {
        self.check_available()?;
        Ok(self.state.read().rules.clone())
    }

    async fn backends(&self) -> Result<Vec<Backend>> {
        self.check_available()?;
        Ok(self.state.read().backends.clone())
    }

    async fn current_state(&self) -> Result<ClusterState> {
        self.check_available()?;
        Ok(self.state.read().clone())
    }
}

/// Watcher reading a JSON document from disk.
///
/// The document has the shape `{ "rules": [...], "backends": [...] }`.
/// Every read goes to the file, so the controller always sees its current
/// content.
#[derive(Debug, Clone)]
pub struct FileWatcher {
    path: PathBuf,
}

impl FileWatcher {
    /// Create a watcher for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The watched file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path).await.map_err(|e| {
            KourierError::transient(format!("cannot read {}", self.path.display()), e)
        })
    }

    fn parse(&self, bytes: &[u8]) -> Result<ClusterState> {
        serde_json::from_slice(bytes).map_err(|e| {
            KourierError::transient(format!("cannot parse {}", self.path.display()), e)
        })
    }

    /// Add `key` to `queue` whenever the file's content changes.
    ///
    /// Changes are detected through filesystem events on the parent
    /// directory, which also catches ConfigMap-style symlink swaps. With
    /// `poll` set, the directory is polled at that interval instead, for
    /// filesystems without native events. Each event re-reads the file and
    /// only a content difference enqueues. The first successful read counts
    /// as a change. Returns when `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns [`KourierError::Configuration`] if the directory cannot be
    /// watched.
    pub async fn watch_changes<F>(
        &self,
        queue: WorkQueue,
        key: impl Into<String>,
        poll: Option<Duration>,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let key = key.into();
        let (tx, mut rx) = mpsc::channel(1);
        let _watcher = self.start_watcher(tx, poll)?;
        tokio::pin!(shutdown);

        info!(path = %self.path.display(), poll = ?poll, "watching rules file");

        let mut last: Option<Vec<u8>> = None;
        self.enqueue_if_changed(&queue, &key, &mut last).await;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                event = rx.recv() => {
                    if event.is_none() {
                        break;
                    }
                }
            }
            self.enqueue_if_changed(&queue, &key, &mut last).await;
        }

        debug!(path = %self.path.display(), "stopped watching rules file");
        Ok(())
    }

    fn start_watcher(
        &self,
        tx: mpsc::Sender<()>,
        poll: Option<Duration>,
    ) -> Result<Box<dyn Watcher + Send>> {
        let file_name = self
            .path
            .file_name()
            .map(OsStr::to_os_string)
            .ok_or_else(|| {
                KourierError::Configuration(format!(
                    "rules file {} has no file name",
                    self.path.display()
                ))
            })?;
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let handler = move |event: notify::Result<notify::Event>| match event {
            Ok(event) if touches(&event, &file_name) => {
                trace!(kind = ?event.kind, "rules directory changed");
                // a full channel already holds a pending re-read
                let _ = tx.try_send(());
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "rules file watch error"),
        };
        let unwatchable = |e: notify::Error| {
            KourierError::Configuration(format!("cannot watch {}: {e}", dir.display()))
        };

        let mut watcher: Box<dyn Watcher + Send> = match poll {
            Some(interval) => Box::new(
                PollWatcher::new(
                    handler,
                    notify::Config::default()
                        .with_poll_interval(interval)
                        .with_compare_contents(true),
                )
                .map_err(unwatchable)?,
            ),
            None => Box::new(notify::recommended_watcher(handler).map_err(unwatchable)?),
        };
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(unwatchable)?;
        Ok(watcher)
    }

    async fn enqueue_if_changed(&self, queue: &WorkQueue, key: &str, last: &mut Option<Vec<u8>>) {
        match self.read().await {
            Ok(bytes) if last.as_deref() != Some(bytes.as_slice()) => {
                debug!(path = %self.path.display(), bytes = bytes.len(), "rules file changed");
                *last = Some(bytes);
                queue.add(key);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "reading rules file failed"),
        }
    }
}

/// Whether `event` may have changed the file named `file_name`.
///
/// Kubernetes mounts swap a `..data` symlink rather than touching the file.
fn touches(event: &notify::Event, file_name: &OsStr) -> bool {
    let kind = &event.kind;
    if !(kind.is_create() || kind.is_modify() || kind.is_remove()) {
        return false;
    }
    event.paths.iter().any(|path| {
        path.file_name()
            .is_some_and(|name| name == file_name || name.to_string_lossy().starts_with(".."))
    })
}

#[async_trait]
impl ResourceWatcher for FileWatcher {
    async fn route_rules(&self) -> Result<Vec<RouteRule>> {
        Ok(self.current_state().await?.rules)
    }

    async fn backends(&self) -> Result<Vec<Backend>> {
        Ok(self.current_state().await?.backends)
    }

    async fn current_state(&self) -> Result<ClusterState> {
        let bytes = self.read().await?;
        self.parse(&bytes)
    }
}
