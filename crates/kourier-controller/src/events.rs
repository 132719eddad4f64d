//! Structured status events emitted by the controller.
//!
//! Reconciliation outcomes and version changes are reported to an
//! [`EventSink`]. [`TracingEventSink`] turns them into log records;
//! [`RecordingEventSink`] keeps them in memory.

use std::time::Duration;

use kourier_core::{ResourceType, ResourceVersion};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::model::ObjectKey;

/// An event emitted by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// A reconciliation completed.
    ReconcileSucceeded {
        /// The key that triggered it.
        key: String,
        /// Whether the published snapshot changed.
        changed: bool,
    },

    /// A reconciliation failed and will be retried.
    ReconcileFailed {
        /// The key that triggered it.
        key: String,
        /// Rendered error.
        error: String,
        /// How many times the key has failed in a row.
        attempt: u32,
        /// Delay before the next attempt.
        retry_in: Duration,
    },

    /// A key exhausted its retries and was dropped.
    ReconcileDropped {
        /// The dropped key.
        key: String,
        /// Rendered error of the last attempt.
        error: String,
        /// How many attempts were made.
        attempts: u32,
    },

    /// A node's published configuration changed.
    VersionChanged {
        /// The gateway node ID.
        node_id: String,
        /// Resource types that took a new version.
        changed_types: Vec<ResourceType>,
        /// Highest version in the new snapshot.
        version: ResourceVersion,
    },

    /// Two rules claimed the same host and path.
    RouteConflict {
        /// The contested host.
        host: String,
        /// The contested path.
        path: String,
        /// The rule that was kept.
        winner: ObjectKey,
        /// The rule that was ignored.
        loser: ObjectKey,
    },
}

/// Receiver of controller events.
pub trait EventSink: Send + Sync + std::fmt::Debug {
    /// Deliver one event. Must not block.
    fn emit(&self, event: ControllerEvent);
}

/// Sink logging each event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: ControllerEvent) {
        match event {
            ControllerEvent::ReconcileSucceeded { key, changed } => {
                info!(key = %key, changed, "reconcile succeeded");
            }
            ControllerEvent::ReconcileFailed {
                key,
                error,
                attempt,
                retry_in,
            } => {
                warn!(key = %key, error = %error, attempt, retry_in = ?retry_in, "reconcile failed");
            }
            ControllerEvent::ReconcileDropped {
                key,
                error,
                attempts,
            } => {
                error!(key = %key, error = %error, attempts, "reconcile dropped after retries");
            }
            ControllerEvent::VersionChanged {
                node_id,
                changed_types,
                version,
            } => {
                let types: Vec<&str> = changed_types.iter().map(|t| t.short_name()).collect();
                info!(node_id = %node_id, version = %version, types = ?types, "configuration version changed");
            }
            ControllerEvent::RouteConflict {
                host,
                path,
                winner,
                loser,
            } => {
                warn!(host = %host, path = %path, winner = %winner, loser = %loser, "conflicting route rules");
            }
        }
    }
}

/// Sink keeping every event in memory.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<ControllerEvent>>,
}

impl RecordingEventSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the events recorded so far.
    pub fn events(&self) -> Vec<ControllerEvent> {
        self.events.lock().clone()
    }

    /// Remove and return the recorded events.
    pub fn take(&self) -> Vec<ControllerEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: ControllerEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingEventSink::new();
        sink.emit(ControllerEvent::ReconcileSucceeded {
            key: "a".into(),
            changed: true,
        });
        sink.emit(ControllerEvent::ReconcileSucceeded {
            key: "b".into(),
            changed: false,
        });

        let events = sink.take();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ControllerEvent::ReconcileSucceeded { key, .. } if key == "a"));
        assert!(sink.is_empty());
    }

    #[test]
    fn tracing_sink_accepts_every_variant() {
        let sink = TracingEventSink;
        sink.emit(ControllerEvent::ReconcileDropped {
            key: "k".into(),
            error: "boom".into(),
            attempts: 3,
        });
        sink.emit(ControllerEvent::VersionChanged {
            node_id: "node".into(),
            changed_types: vec![ResourceType::Cluster],
            version: ResourceVersion::new(4),
        });
    }
}
