//! Level-triggered reconciliation.
//!
//! A reconciliation ignores which key triggered it: it pulls the complete
//! current state, translates it and publishes the result for the gateway
//! node. Publishing unchanged content is a no-op in the cache, so
//! reconciling twice without a state change never issues a new version.

use std::sync::Arc;

use async_trait::async_trait;
use kourier_cache::{Cache, SetOutcome, SnapshotCache};
use kourier_core::{GatewayNode, Result};
use tracing::{debug, instrument};

use crate::events::{ControllerEvent, EventSink};
use crate::translator::Translator;
use crate::watcher::ResourceWatcher;

/// Work performed for a dequeued key.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Bring the published configuration in line with the current state.
    ///
    /// Errors are reported to the scheduler, which decides whether the key
    /// is retried.
    async fn reconcile(&self, key: &str) -> Result<SetOutcome>;
}

/// Reconciler publishing the gateway snapshot for all routing rules.
#[derive(Debug)]
pub struct IngressReconciler {
    watcher: Arc<dyn ResourceWatcher>,
    translator: Translator,
    cache: Arc<SnapshotCache>,
    node: GatewayNode,
    events: Arc<dyn EventSink>,
}

impl IngressReconciler {
    /// Create a reconciler publishing for `node`.
    pub fn new(
        watcher: Arc<dyn ResourceWatcher>,
        translator: Translator,
        cache: Arc<SnapshotCache>,
        node: GatewayNode,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            watcher,
            translator,
            cache,
            node,
            events,
        }
    }

    /// The node snapshots are published for.
    pub fn node(&self) -> &GatewayNode {
        &self.node
    }
}

#[async_trait]
impl Reconciler for IngressReconciler {
    #[instrument(skip(self), fields(node = %self.node))]
    async fn reconcile(&self, key: &str) -> Result<SetOutcome> {
        let state = self.watcher.current_state().await?;
        let translation = self.translator.translate(&state.rules, &state.backends)?;

        for conflict in translation.conflicts {
            self.events.emit(ControllerEvent::RouteConflict {
                host: conflict.host,
                path: conflict.path,
                winner: conflict.winner,
                loser: conflict.loser,
            });
        }

        let outcome = self.cache.set_snapshot(self.node.hash(), translation.snapshot);
        match &outcome {
            SetOutcome::Updated {
                version, changed, ..
            } => {
                self.events.emit(ControllerEvent::VersionChanged {
                    node_id: self.node.id().to_string(),
                    changed_types: changed.clone(),
                    version: *version,
                });
            }
            SetOutcome::Unchanged { version } => {
                debug!(version = %version, "configuration unchanged");
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventSink;
    use crate::model::{Backend, BackendRef, EndpointAddress, RouteRule};
    use crate::watcher::InMemoryWatcher;
    use kourier_core::{KourierError, ResourceType};

    struct Fixture {
        watcher: Arc<InMemoryWatcher>,
        cache: Arc<SnapshotCache>,
        events: Arc<RecordingEventSink>,
        reconciler: IngressReconciler,
    }

    fn fixture() -> Fixture {
        let watcher = Arc::new(InMemoryWatcher::new());
        let cache = Arc::new(SnapshotCache::new());
        let events = Arc::new(RecordingEventSink::new());
        let reconciler = IngressReconciler::new(
            watcher.clone(),
            Translator::default(),
            cache.clone(),
            GatewayNode::default(),
            events.clone(),
        );
        Fixture {
            watcher,
            cache,
            events,
            reconciler,
        }
    }

    fn hello_rule() -> RouteRule {
        RouteRule::new("default", "hello", "foo.example.com", "/")
            .with_backend(BackendRef::new("hello", 100))
    }

    #[tokio::test]
    async fn publishes_for_gateway_node() {
        let f = fixture();
        f.watcher.upsert_rule(hello_rule());

        let outcome = f.reconciler.reconcile("any").await.unwrap();
        assert!(outcome.is_updated());

        let snapshot = f.cache.get_snapshot(GatewayNode::default().hash()).unwrap();
        assert_eq!(snapshot.resources(ResourceType::Cluster).len(), 1);
        assert!(matches!(
            f.events.events().as_slice(),
            [ControllerEvent::VersionChanged { .. }]
        ));
    }

    #[tokio::test]
    async fn unchanged_state_keeps_version() {
        let f = fixture();
        f.watcher.upsert_rule(hello_rule());

        let first = f.reconciler.reconcile("a").await.unwrap();
        let second = f.reconciler.reconcile("b").await.unwrap();
        assert_eq!(second, SetOutcome::Unchanged { version: first.version() });
        assert_eq!(f.events.len(), 1);
    }

    #[tokio::test]
    async fn endpoint_change_only_bumps_load_assignments() {
        let f = fixture();
        f.watcher.upsert_rule(hello_rule());
        f.watcher.upsert_backend(
            Backend::new("default", "hello").with_endpoint(EndpointAddress::ready("10.0.0.1", 80)),
        );
        f.reconciler.reconcile("k").await.unwrap();

        f.watcher.upsert_backend(
            Backend::new("default", "hello").with_endpoint(EndpointAddress::ready("10.0.0.2", 80)),
        );
        let outcome = f.reconciler.reconcile("k").await.unwrap();
        let SetOutcome::Updated { changed, .. } = outcome else {
            panic!("expected update");
        };
        assert_eq!(changed, vec![ResourceType::Endpoint]);
    }

    #[tokio::test]
    async fn translation_failure_keeps_previous_snapshot() {
        let f = fixture();
        f.watcher.upsert_rule(hello_rule());
        f.reconciler.reconcile("k").await.unwrap();
        let before = f.cache.get_snapshot(GatewayNode::default().hash()).unwrap();

        f.watcher
            .upsert_rule(RouteRule::new("default", "broken", "", "/").with_backend(BackendRef::new("x", 1)));
        let err = f.reconciler.reconcile("k").await.unwrap_err();
        assert!(matches!(err, KourierError::Translation { .. }));

        let after = f.cache.get_snapshot(GatewayNode::default().hash()).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn unavailable_watcher_is_reported() {
        let f = fixture();
        f.watcher.set_unavailable(true);
        let err = f.reconciler.reconcile("k").await.unwrap_err();
        assert!(matches!(err, KourierError::TransientInput { .. }));
        assert!(f.cache.get_snapshot(GatewayNode::default().hash()).is_none());
    }

    #[tokio::test]
    async fn conflicts_are_reported_as_events() {
        let f = fixture();
        f.watcher.upsert_rule(hello_rule());
        f.watcher.upsert_rule(
            RouteRule::new("other", "hello", "foo.example.com", "/")
                .with_backend(BackendRef::new("hello", 100)),
        );

        f.reconciler.reconcile("k").await.unwrap();
        let conflicts: Vec<_> = f
            .events
            .events()
            .into_iter()
            .filter(|e| matches!(e, ControllerEvent::RouteConflict { .. }))
            .collect();
        assert_eq!(conflicts.len(), 1);
    }
}
