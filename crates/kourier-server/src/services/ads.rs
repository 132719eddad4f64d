//! Aggregated Discovery Service (ADS) implementation.
//!
//! ADS multiplexes clusters, load assignments, listeners and route tables
//! over a single gRPC stream. Each stream runs in its own task that waits
//! on whichever comes first: the next client request, a snapshot published
//! for the stream's node, the client going away, or process shutdown.

use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use kourier_cache::{Cache, Snapshot, SnapshotCache, Watch};
use kourier_core::{KourierError, NodeHash};
use kourier_types::envoy::service::discovery::v3::aggregated_discovery_service_server::{
    AggregatedDiscoveryService, AggregatedDiscoveryServiceServer,
};
use kourier_types::envoy::service::discovery::v3::{DiscoveryRequest, DiscoveryResponse};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info, instrument, warn};

use crate::config::ServerConfig;
use crate::metrics::{DiscoveryMetrics, StreamTracker};
use crate::shutdown::ShutdownController;
use crate::sotw::{SotwHandler, StreamState};
use crate::stream::StreamContext;

/// Configuration for the ADS service.
#[derive(Debug, Clone)]
pub struct AdsConfig {
    /// Response buffer size per stream.
    pub response_buffer_size: usize,
    /// Identifier reported in every response.
    pub control_plane_id: String,
}

impl Default for AdsConfig {
    fn default() -> Self {
        Self {
            response_buffer_size: 16,
            control_plane_id: "kourier".to_string(),
        }
    }
}

impl From<&ServerConfig> for AdsConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            response_buffer_size: config.response_buffer_size,
            control_plane_id: config.control_plane_id.clone(),
        }
    }
}

/// Response stream type for ADS.
pub type AdsResponseStream = ReceiverStream<Result<DiscoveryResponse, Status>>;

/// Aggregated Discovery Service.
#[derive(Debug, Clone)]
pub struct AdsService {
    cache: Arc<SnapshotCache>,
    handler: Arc<SotwHandler>,
    metrics: DiscoveryMetrics,
    shutdown: ShutdownController,
    config: AdsConfig,
}

impl AdsService {
    /// Create a new ADS service.
    pub fn new(
        cache: Arc<SnapshotCache>,
        metrics: DiscoveryMetrics,
        shutdown: ShutdownController,
        config: AdsConfig,
    ) -> Self {
        let handler = Arc::new(SotwHandler::new(
            Arc::clone(&cache),
            metrics.clone(),
            config.control_plane_id.clone(),
        ));
        Self {
            cache,
            handler,
            metrics,
            shutdown,
            config,
        }
    }

    /// Get a reference to the cache.
    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &AdsConfig {
        &self.config
    }

    /// Wrap this service for registration with a tonic router.
    pub fn into_server(self) -> AggregatedDiscoveryServiceServer<Self> {
        AggregatedDiscoveryServiceServer::new(self)
    }

    /// Serve one stream of requests.
    ///
    /// Spawns the stream task and returns the response side. The task ends
    /// when the request stream ends or fails, when the response stream is
    /// dropped, or on shutdown; ending it removes its watch from the
    /// node's fan-out.
    pub fn open_stream<S>(&self, requests: S) -> AdsResponseStream
    where
        S: Stream<Item = Result<DiscoveryRequest, Status>> + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::channel(self.config.response_buffer_size);
        let service = self.clone();
        let guard = self.shutdown.register_operation();

        tokio::spawn(async move {
            let _guard = guard;
            service.run_stream(requests, tx).await;
        });

        ReceiverStream::new(rx)
    }

    async fn run_stream<S>(
        &self,
        mut requests: S,
        tx: mpsc::Sender<Result<DiscoveryResponse, Status>>,
    ) where
        S: Stream<Item = Result<DiscoveryRequest, Status>> + Unpin,
    {
        let _tracker = StreamTracker::new(self.metrics.clone());
        let mut ctx = StreamContext::new();
        let mut state = StreamState::new();
        let mut watch: Option<Watch> = None;
        let shutdown = self.shutdown.shutdown_signal().wait();
        tokio::pin!(shutdown);

        info!(stream = %ctx.id(), "ADS stream started");

        'stream: loop {
            let responses: Vec<DiscoveryResponse> = tokio::select! {
                _ = &mut shutdown => {
                    debug!(stream = %ctx.id(), "closing stream for shutdown");
                    break;
                }
                _ = tx.closed() => {
                    debug!(stream = %ctx.id(), "client disconnected");
                    break;
                }
                next = requests.next() => match next {
                    Some(Ok(request)) => {
                        // Subscribe before reading the cache so no publication
                        // between the two is missed.
                        if watch.is_none() {
                            if let Some(node) = request.node.as_ref().filter(|n| !n.id.is_empty()) {
                                watch = Some(self.cache.watch(NodeHash::from_id(&node.id)));
                            }
                        }
                        match self.handler.handle_request(&mut ctx, &mut state, &request) {
                            Ok(response) => response.into_iter().collect(),
                            Err(e) => {
                                warn!(
                                    stream = %ctx.id(),
                                    type_url = %request.type_url,
                                    error = %e,
                                    "ignoring request"
                                );
                                Vec::new()
                            }
                        }
                    }
                    Some(Err(status)) => {
                        debug!(stream = %ctx.id(), status = %status, "stream error");
                        break;
                    }
                    None => {
                        debug!(stream = %ctx.id(), "client closed stream");
                        break;
                    }
                },
                update = next_update(&mut watch) => match update {
                    Some(snapshot) => self.handler.handle_update(&mut ctx, &mut state, &snapshot),
                    None => {
                        watch = None;
                        Vec::new()
                    }
                },
            };

            for response in responses {
                if tx.send(Ok(response)).await.is_err() {
                    debug!(stream = %ctx.id(), "client disconnected");
                    break 'stream;
                }
            }
        }

        info!(
            stream = %ctx.id(),
            node_id = ctx.node_id().unwrap_or_default(),
            duration = ?ctx.duration(),
            requests = ctx.request_count(),
            responses = ctx.response_count(),
            "ADS stream ended"
        );
    }
}

/// The next snapshot published for the stream's node.
///
/// Pends forever until the node is known; `None` once the cache is gone.
async fn next_update(watch: &mut Option<Watch>) -> Option<Arc<Snapshot>> {
    match watch {
        Some(watch) => watch.changed().await,
        None => std::future::pending().await,
    }
}

#[async_trait]
impl AggregatedDiscoveryService for AdsService {
    type StreamAggregatedResourcesStream = AdsResponseStream;

    #[instrument(skip(self, request), name = "ads_stream")]
    async fn stream_aggregated_resources(
        &self,
        request: Request<Streaming<DiscoveryRequest>>,
    ) -> Result<Response<Self::StreamAggregatedResourcesStream>, Status> {
        if self.shutdown.is_shutdown() {
            return Err(KourierError::Shutdown.into());
        }
        Ok(Response::new(self.open_stream(request.into_inner())))
    }
}
