//! Shutdown coordination.
//!
//! The process shares one [`ShutdownController`] between the discovery
//! server, the reconciliation workers and the rules file watcher. Each open
//! ADS stream holds an [`OperationGuard`]; [`ShutdownController::shutdown`]
//! signals every holder of a [`ShutdownSignal`] and then waits, at most for
//! the grace period, until the last guard is dropped.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use kourier_server::ShutdownController;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let shutdown = ShutdownController::new();
//! let worker = tokio::spawn(shutdown.shutdown_signal().wait());
//!
//! assert!(shutdown.shutdown(Duration::from_secs(1)).await);
//! worker.await.unwrap();
//! # }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tracing::{info, warn};

/// Shared handle that starts shutdown and tracks what is still running.
#[derive(Debug, Clone)]
pub struct ShutdownController {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    stopping: watch::Sender<bool>,
    in_flight: AtomicUsize,
    idle: Notify,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    /// A controller that has not started shutting down.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                stopping: watch::Sender::new(false),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Receiver that flips to `true` once shutdown starts.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shared.stopping.subscribe()
    }

    /// Whether shutdown has started.
    pub fn is_shutdown(&self) -> bool {
        *self.shared.stopping.borrow()
    }

    /// Future-producing handle for a task that must stop on shutdown.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.subscribe(),
        }
    }

    /// Start shutdown and wait up to `grace_period` for tracked operations.
    ///
    /// Returns `true` when every operation finished in time. Only the first
    /// call waits; later calls return `true` immediately.
    pub async fn shutdown(&self, grace_period: Duration) -> bool {
        let first = self.shared.stopping.send_if_modified(|stopping| {
            let changed = !*stopping;
            *stopping = true;
            changed
        });
        if !first {
            return true;
        }

        info!(grace_period = ?grace_period, open = self.active_operations(), "shutting down");
        if tokio::time::timeout(grace_period, self.idle()).await.is_ok() {
            info!("all operations finished");
            true
        } else {
            warn!(open = self.active_operations(), "grace period elapsed with operations open");
            false
        }
    }

    async fn idle(&self) {
        loop {
            let idle = self.shared.idle.notified();
            if self.active_operations() == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Track an operation until the returned guard is dropped.
    pub fn register_operation(&self) -> OperationGuard {
        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);
        OperationGuard {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Operations currently tracked.
    pub fn active_operations(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }
}

/// Keeps an operation counted while alive.
#[derive(Debug)]
pub struct OperationGuard {
    shared: Arc<Shared>,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        if self.shared.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.shared.idle.notify_waiters();
        }
    }
}

/// Resolves once shutdown starts.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Wait for shutdown. A dropped controller counts as shutdown.
    pub async fn wait(mut self) {
        let _ = self.rx.wait_for(|stopping| *stopping).await;
    }
}

/// Wait for SIGTERM or SIGINT.
///
/// Falls back to Ctrl+C when the Unix handlers cannot be installed, and
/// waits forever when neither can.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("received SIGTERM"),
                    _ = sigint.recv() => info!("received SIGINT"),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => warn!(error = %e, "cannot install signal handlers"),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C"),
        Err(e) => {
            warn!(error = %e, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}
