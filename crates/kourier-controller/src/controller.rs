//! Reconciliation scheduler.
//!
//! A [`Controller`] runs a bounded pool of workers over a shared
//! [`WorkQueue`]. It is the only component that decides what happens to a
//! failed reconciliation: retry with backoff, or drop once the retry
//! ceiling is reached.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tokio::task::JoinSet;
use tracing::{debug, error, info, Instrument};

use crate::events::{ControllerEvent, EventSink};
use crate::queue::{Retry, WorkQueue};
use crate::reconciler::Reconciler;

/// Worker pool settings.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Number of parallel workers.
    pub workers: usize,
    /// Time in-flight reconciliations get to finish on shutdown.
    pub grace_period: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            grace_period: Duration::from_secs(5),
        }
    }
}

/// Drives reconciliations from the work queue.
///
/// # Example
///
/// ```rust,ignore
/// let controller = Controller::new(queue.clone(), reconciler, events, ControllerConfig::default());
/// queue.add("ingress");
/// controller.run(shutdown.shutdown_signal().wait()).await;
/// ```
pub struct Controller {
    queue: WorkQueue,
    reconciler: Arc<dyn Reconciler>,
    events: Arc<dyn EventSink>,
    config: ControllerConfig,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("queue", &self.queue)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Create a controller.
    pub fn new(
        queue: WorkQueue,
        reconciler: Arc<dyn Reconciler>,
        events: Arc<dyn EventSink>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            queue,
            reconciler,
            events,
            config,
        }
    }

    /// The queue workers pull from.
    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// Run the workers until `shutdown` completes.
    ///
    /// On shutdown the queue stops handing out keys; reconciliations still
    /// running after the grace period are cancelled.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let workers = self.config.workers.max(1);
        let mut tasks = JoinSet::new();
        for id in 0..workers {
            let worker = Worker {
                queue: self.queue.clone(),
                reconciler: Arc::clone(&self.reconciler),
                events: Arc::clone(&self.events),
            };
            tasks.spawn(worker.run().instrument(tracing::info_span!("worker", id)));
        }
        info!(workers, "controller started");

        shutdown.await;
        self.queue.shut_down();
        debug!("controller draining");

        let drained = tokio::time::timeout(self.config.grace_period, async {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    error!(error = %e, "worker failed");
                }
            }
        })
        .await;
        if drained.is_err() {
            info!(remaining = tasks.len(), "cancelling in-flight reconciliations");
            tasks.shutdown().await;
        }

        info!("controller stopped");
    }
}

struct Worker {
    queue: WorkQueue,
    reconciler: Arc<dyn Reconciler>,
    events: Arc<dyn EventSink>,
}

impl Worker {
    async fn run(self) {
        while let Some(key) = self.queue.get().await {
            self.process(&key).await;
            self.queue.done(&key);
        }
    }

    async fn process(&self, key: &str) {
        let started = Instant::now();
        let result = self.reconciler.reconcile(key).await;
        histogram!("kourier_reconcile_duration_seconds").record(started.elapsed().as_secs_f64());

        match result {
            Ok(outcome) => {
                counter!("kourier_reconcile_total", "result" => "success").increment(1);
                self.queue.forget(key);
                self.events.emit(ControllerEvent::ReconcileSucceeded {
                    key: key.to_string(),
                    changed: outcome.is_updated(),
                });
            }
            Err(e) if e.is_fatal() => {
                counter!("kourier_reconcile_total", "result" => "error").increment(1);
                counter!("kourier_reconcile_dropped_total").increment(1);
                let attempts = self.queue.failures(key) + 1;
                self.queue.forget(key);
                self.events.emit(ControllerEvent::ReconcileDropped {
                    key: key.to_string(),
                    error: e.to_string(),
                    attempts,
                });
            }
            Err(e) => {
                counter!("kourier_reconcile_total", "result" => "error").increment(1);
                match self.queue.retry(key) {
                    Retry::Scheduled { attempt, delay } => {
                        self.events.emit(ControllerEvent::ReconcileFailed {
                            key: key.to_string(),
                            error: e.to_string(),
                            attempt,
                            retry_in: delay,
                        });
                    }
                    Retry::Exhausted { attempts } => {
                        counter!("kourier_reconcile_dropped_total").increment(1);
                        self.events.emit(ControllerEvent::ReconcileDropped {
                            key: key.to_string(),
                            error: e.to_string(),
                            attempts,
                        });
                    }
                }
            }
        }
    }
}
