//! Server builder for configuring and creating the discovery server.

use std::sync::Arc;
use std::time::Duration;

use kourier_cache::SnapshotCache;
use kourier_core::{KourierError, Result};
use tonic::transport::Server;

use crate::config::ServerConfig;
use crate::health::HealthService;
use crate::metrics::DiscoveryMetrics;
use crate::services::{AdsConfig, AdsService};
use crate::shutdown::ShutdownController;
use crate::DiscoveryServer;

/// Builder for creating a [`DiscoveryServer`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use kourier_cache::SnapshotCache;
/// use kourier_server::DiscoveryServerBuilder;
///
/// let cache = Arc::new(SnapshotCache::new());
/// let server = DiscoveryServerBuilder::new()
///     .cache(cache)
///     .max_concurrent_streams(200)
///     .grace_period(Duration::from_secs(2))
///     .build()
///     .unwrap();
///
/// assert_eq!(server.config().max_concurrent_streams, Some(200));
/// ```
#[derive(Debug, Default)]
pub struct DiscoveryServerBuilder {
    cache: Option<Arc<SnapshotCache>>,
    shutdown: Option<ShutdownController>,
    max_concurrent_streams: Option<u32>,
    keepalive_interval: Option<Duration>,
    keepalive_timeout: Option<Duration>,
    max_request_size: Option<usize>,
    response_buffer_size: Option<usize>,
    grace_period: Option<Duration>,
    control_plane_id: Option<String>,
}

impl DiscoveryServerBuilder {
    /// Create a new server builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache to serve from.
    ///
    /// This is required.
    pub fn cache(mut self, cache: Arc<SnapshotCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Share a shutdown controller with the rest of the process.
    ///
    /// If not set, the server creates its own.
    pub fn shutdown_controller(mut self, shutdown: ShutdownController) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Set maximum concurrent streams per connection.
    pub fn max_concurrent_streams(mut self, max: u32) -> Self {
        self.max_concurrent_streams = Some(max);
        self
    }

    /// Set keepalive interval.
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self
    }

    /// Set keepalive timeout.
    pub fn keepalive_timeout(mut self, timeout: Duration) -> Self {
        self.keepalive_timeout = Some(timeout);
        self
    }

    /// Set maximum request size in bytes.
    pub fn max_request_size(mut self, size: usize) -> Self {
        self.max_request_size = Some(size);
        self
    }

    /// Set how many responses a stream buffers before waiting on the client.
    pub fn response_buffer_size(mut self, size: usize) -> Self {
        self.response_buffer_size = Some(size);
        self
    }

    /// Set the time open streams get to finish during shutdown.
    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = Some(grace_period);
        self
    }

    /// Set the identifier reported in every response.
    pub fn control_plane_id(mut self, id: impl Into<String>) -> Self {
        self.control_plane_id = Some(id.into());
        self
    }

    /// Build the server.
    ///
    /// # Errors
    ///
    /// Returns [`KourierError::Configuration`] if:
    /// - No cache was provided
    /// - The response buffer size or maximum request size is zero
    pub fn build(self) -> Result<DiscoveryServer> {
        let cache = self
            .cache
            .ok_or_else(|| KourierError::Configuration("cache is required".into()))?;

        let defaults = ServerConfig::default();
        let config = ServerConfig {
            max_concurrent_streams: self.max_concurrent_streams.or(defaults.max_concurrent_streams),
            keepalive_interval: self.keepalive_interval.or(defaults.keepalive_interval),
            keepalive_timeout: self.keepalive_timeout.or(defaults.keepalive_timeout),
            max_request_size: self.max_request_size.unwrap_or(defaults.max_request_size),
            response_buffer_size: self
                .response_buffer_size
                .unwrap_or(defaults.response_buffer_size),
            grace_period: self.grace_period.unwrap_or(defaults.grace_period),
            control_plane_id: self.control_plane_id.unwrap_or(defaults.control_plane_id),
        };

        config.validate()?;

        let shutdown = self.shutdown.unwrap_or_default();
        let metrics = DiscoveryMetrics::new();
        let ads = AdsService::new(
            Arc::clone(&cache),
            metrics.clone(),
            shutdown.clone(),
            AdsConfig::from(&config),
        );
        let (health, health_svc) = HealthService::new();

        let mut builder = Server::builder();
        if let Some(interval) = config.keepalive_interval {
            builder = builder.http2_keepalive_interval(Some(interval));
        }
        if let Some(timeout) = config.keepalive_timeout {
            builder = builder.http2_keepalive_timeout(Some(timeout));
        }
        if let Some(max_streams) = config.max_concurrent_streams {
            builder = builder.concurrency_limit_per_connection(max_streams as usize);
        }

        let router = builder
            .add_service(
                ads.clone()
                    .into_server()
                    .max_decoding_message_size(config.max_request_size),
            )
            .add_service(health_svc);

        Ok(DiscoveryServer {
            cache,
            config,
            ads,
            metrics,
            health,
            shutdown,
            router,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_cache() {
        let result = DiscoveryServerBuilder::new().build();
        assert!(matches!(result, Err(KourierError::Configuration(_))));
    }

    #[test]
    fn builder_rejects_zero_buffer() {
        let result = DiscoveryServerBuilder::new()
            .cache(Arc::new(SnapshotCache::new()))
            .response_buffer_size(0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_applies_defaults() {
        let server = DiscoveryServerBuilder::new()
            .cache(Arc::new(SnapshotCache::new()))
            .build()
            .unwrap();

        assert_eq!(server.config().max_concurrent_streams, Some(100));
        assert_eq!(server.config().response_buffer_size, 16);
        assert_eq!(server.config().control_plane_id, "kourier");
    }

    #[test]
    fn builder_shares_shutdown_controller() {
        let shutdown = ShutdownController::new();
        let server = DiscoveryServerBuilder::new()
            .cache(Arc::new(SnapshotCache::new()))
            .shutdown_controller(shutdown.clone())
            .build()
            .unwrap();

        let _guard = shutdown.register_operation();
        assert_eq!(server.shutdown_controller().active_operations(), 1);
    }
}
