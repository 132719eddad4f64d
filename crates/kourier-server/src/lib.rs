//! # kourier-server
//!
//! Discovery server streaming published snapshots to gateway proxies.
//!
//! - [`DiscoveryServer`] - gRPC server exposing the Aggregated Discovery Service
//! - [`DiscoveryServerBuilder`] - Builder for configuring the server
//! - State-of-the-World protocol with ACK/NACK tracking and push on publish
//! - Health checking via the gRPC health protocol
//! - Metrics through the `metrics` facade
//! - Graceful shutdown with a bounded grace period
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kourier_cache::SnapshotCache;
//! use kourier_server::DiscoveryServer;
//!
//! let cache = Arc::new(SnapshotCache::new());
//! let server = DiscoveryServer::builder().cache(cache).build()?;
//!
//! let listener = server.bind("0.0.0.0:18000".parse()?).await?;
//! server.serve_with_listener(listener).await?;
//! ```
//!
//! ## Stream lifecycle
//!
//! A gateway opens one ADS stream and subscribes to clusters, load
//! assignments, listeners and route tables on it. The first request must
//! carry the node identifier; it selects the snapshot the stream is served
//! from. Publishing a snapshot for that node pushes the changed types to
//! every open stream of the node. A stream closes when the gateway
//! disconnects or when the process shuts down.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod config;
pub mod health;
pub mod metrics;
pub mod shutdown;
mod sotw;
mod stream;
mod utils;


pub mod services;

pub use builder::DiscoveryServerBuilder;
pub use config::ServerConfig;
pub use health::HealthService;
pub use metrics::DiscoveryMetrics;
pub use services::{AdsConfig, AdsService};
pub use shutdown::{ShutdownController, ShutdownSignal};
pub use sotw::{SotwHandler, StreamState, Subscription};
pub use stream::{StreamContext, StreamId};

use std::net::SocketAddr;
use std::sync::Arc;

use kourier_cache::SnapshotCache;
use kourier_core::{KourierError, Result};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::server::Router;
use tracing::info;

/// The discovery server.
///
/// Serves the Aggregated Discovery Service and the gRPC health service on
/// the management listener.
pub struct DiscoveryServer {
    cache: Arc<SnapshotCache>,
    config: ServerConfig,
    ads: AdsService,
    metrics: DiscoveryMetrics,
    health: HealthService,
    shutdown: ShutdownController,
    router: Router,
}

impl std::fmt::Debug for DiscoveryServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryServer")
            .field("config", &self.config)
            .field("active_streams", &self.metrics.active_streams())
            .finish_non_exhaustive()
    }
}

impl DiscoveryServer {
    /// Create a new builder for configuring the server.
    pub fn builder() -> DiscoveryServerBuilder {
        DiscoveryServerBuilder::new()
    }

    /// Get a reference to the cache.
    #[inline]
    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// Get the server configuration.
    #[inline]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the metrics instance.
    #[inline]
    pub fn metrics(&self) -> &DiscoveryMetrics {
        &self.metrics
    }

    /// Get the health service.
    #[inline]
    pub fn health(&self) -> &HealthService {
        &self.health
    }

    /// Get the shutdown controller.
    #[inline]
    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.shutdown
    }

    /// Get the ADS service, e.g. to serve in-process streams.
    #[inline]
    pub fn ads_service(&self) -> &AdsService {
        &self.ads
    }

    /// Bind the management listener.
    ///
    /// # Errors
    ///
    /// Returns [`KourierError::Bind`], which is fatal to the process.
    pub async fn bind(&self, addr: SocketAddr) -> Result<TcpListener> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| KourierError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!(addr = %addr, "management listener bound");
        Ok(listener)
    }

    /// Bind `addr` and serve until shutdown is initiated.
    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let listener = self.bind(addr).await?;
        self.serve_with_listener(listener).await
    }

    /// Serve on an already bound listener until shutdown is initiated.
    ///
    /// When the shared [`ShutdownController`] fires, health turns
    /// NOT_SERVING, open streams end, and the transport drains remaining
    /// connections.
    pub async fn serve_with_listener(self, listener: TcpListener) -> Result<()> {
        let addr = listener
            .local_addr()
            .map_err(|e| KourierError::internal("listener has no local address", e))?;
        let health = self.health.clone();
        let signal = self.shutdown.shutdown_signal();

        info!(addr = %addr, "discovery server listening");

        self.router
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                signal.wait().await;
                health.set_all_not_serving().await;
                info!("discovery server draining");
            })
            .await
            .map_err(|e| KourierError::transport("discovery server failed", e))?;

        info!(addr = %addr, "discovery server stopped");
        Ok(())
    }
}
