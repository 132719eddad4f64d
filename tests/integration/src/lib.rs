//! Shared harness for the end-to-end tests.
//!
//! [`ControlPlane`] wires an in-memory watcher, the ingress reconciler, the
//! snapshot cache and the ADS service together the way the binary does, minus
//! the network: gateway streams are driven over in-memory channels.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use kourier_cache::{Cache, SetOutcome, Snapshot, SnapshotCache};
use kourier_controller::{
    Backend, BackendRef, EndpointAddress, InMemoryWatcher, IngressReconciler, Reconciler,
    RecordingEventSink, RouteRule, Translator, TranslatorConfig, RECONCILE_KEY,
};
use kourier_core::{GatewayNode, Result};
use kourier_server::metrics::DiscoveryMetrics;
use kourier_server::services::{AdsConfig, AdsResponseStream, AdsService};
use kourier_server::ShutdownController;
use kourier_types::envoy::config::core::v3::Node;
use kourier_types::envoy::service::discovery::v3::{DiscoveryRequest, DiscoveryResponse};
use prost::Message;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tonic::Status;

/// How long a stream must stay silent to count as quiet.
pub const QUIET: Duration = Duration::from_millis(100);
/// Upper bound on waiting for an expected response.
pub const WAIT: Duration = Duration::from_secs(2);

/// Control plane assembled from in-memory parts.
pub struct ControlPlane {
    /// Source of rules and backends.
    pub watcher: Arc<InMemoryWatcher>,
    /// Published snapshots.
    pub cache: Arc<SnapshotCache>,
    /// Recorded controller events.
    pub events: Arc<RecordingEventSink>,
    /// The gateway node configuration is published for.
    pub node: GatewayNode,
    /// Shared with the ADS service.
    pub shutdown: ShutdownController,
    reconciler: Arc<IngressReconciler>,
    service: AdsService,
}

impl ControlPlane {
    /// Control plane for the default gateway node.
    pub fn new() -> Self {
        Self::with_node(GatewayNode::default())
    }

    /// Control plane publishing for `node`.
    pub fn with_node(node: GatewayNode) -> Self {
        let watcher = Arc::new(InMemoryWatcher::new());
        let cache = Arc::new(SnapshotCache::new());
        let events = Arc::new(RecordingEventSink::new());
        let shutdown = ShutdownController::new();

        let reconciler = Arc::new(IngressReconciler::new(
            watcher.clone(),
            Translator::new(TranslatorConfig::default()),
            Arc::clone(&cache),
            node.clone(),
            events.clone(),
        ));
        let service = AdsService::new(
            Arc::clone(&cache),
            DiscoveryMetrics::new(),
            shutdown.clone(),
            AdsConfig::default(),
        );

        Self {
            watcher,
            cache,
            events,
            node,
            shutdown,
            reconciler,
            service,
        }
    }

    /// The reconciler, for wiring into a controller.
    pub fn reconciler(&self) -> Arc<IngressReconciler> {
        Arc::clone(&self.reconciler)
    }

    /// Run one reconciliation.
    pub async fn reconcile(&self) -> Result<SetOutcome> {
        self.reconciler.reconcile(RECONCILE_KEY).await
    }

    /// The snapshot currently published for the node.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.cache.get_snapshot(self.node.hash())
    }

    /// Open a gateway stream.
    pub fn connect(&self) -> Gateway {
        let (tx, rx) = mpsc::channel(16);
        let responses = self.service.open_stream(ReceiverStream::new(rx));
        Gateway {
            node_id: self.node.id().to_string(),
            tx,
            responses,
        }
    }
}

impl Default for ControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

/// Gateway end of one ADS stream.
pub struct Gateway {
    node_id: String,
    tx: mpsc::Sender<std::result::Result<DiscoveryRequest, Status>>,
    responses: AdsResponseStream,
}

impl Gateway {
    /// Subscribe to `type_url`, claiming `version` is already applied.
    pub async fn subscribe(&self, type_url: &str, version: &str) {
        self.send(self.request(type_url, version, "")).await;
    }

    /// Acknowledge `response`.
    pub async fn ack(&self, response: &DiscoveryResponse) {
        self.send(self.request(&response.type_url, &response.version_info, &response.nonce))
            .await;
    }

    /// Send a raw request.
    pub async fn send(&self, request: DiscoveryRequest) {
        self.tx.send(Ok(request)).await.unwrap();
    }

    /// Build a request carrying this gateway's node identity.
    pub fn request(&self, type_url: &str, version: &str, nonce: &str) -> DiscoveryRequest {
        DiscoveryRequest {
            version_info: version.to_string(),
            node: Some(Node {
                id: self.node_id.clone(),
                cluster: "kourier-gateway".to_string(),
            }),
            type_url: type_url.to_string(),
            response_nonce: nonce.to_string(),
            ..Default::default()
        }
    }

    /// Next response.
    pub async fn recv(&mut self) -> DiscoveryResponse {
        tokio::time::timeout(WAIT, self.responses.next())
            .await
            .expect("timed out waiting for a response")
            .expect("stream ended")
            .expect("stream returned an error")
    }

    /// Assert nothing arrives for [`QUIET`].
    pub async fn assert_quiet(&mut self) {
        let next = tokio::time::timeout(QUIET, self.responses.next()).await;
        assert!(next.is_err(), "unexpected response: {next:?}");
    }
}

/// Decode every resource of a response.
pub fn decode_all<M: Message + Default>(response: &DiscoveryResponse) -> Vec<M> {
    response
        .resources
        .iter()
        .map(|any| M::decode(any.value.as_slice()).unwrap())
        .collect()
}

/// A rule in `default` routing `host` and `path` to one backend.
pub fn rule(name: &str, host: &str, path: &str, backend: &str) -> RouteRule {
    RouteRule::new("default", name, host, path).with_backend(BackendRef::new(backend, 100))
}

/// A backend in `default` with `ready` ready endpoints on port 8080.
pub fn backend(name: &str, ready: u8) -> Backend {
    (1..=ready).fold(Backend::new("default", name), |backend, i| {
        backend.with_endpoint(EndpointAddress::ready(format!("10.0.0.{i}"), 8080))
    })
}
