//! Metrics for the discovery server.
//!
//! Recorded through the `metrics` facade; the process decides which
//! recorder (if any) is installed.
//!
//! - Request, response, ACK and NACK counters per resource type
//! - Active stream gauge and stream duration histogram
//!
//! # Example
//!
//! ```rust
//! use kourier_server::metrics::DiscoveryMetrics;
//!
//! let metrics = DiscoveryMetrics::new();
//! metrics.record_request("type.googleapis.com/envoy.config.cluster.v3.Cluster");
//! metrics.record_response("type.googleapis.com/envoy.config.cluster.v3.Cluster", 3);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};

/// Metrics for the discovery server.
#[derive(Debug, Clone)]
pub struct DiscoveryMetrics {
    inner: Arc<DiscoveryMetricsInner>,
}

#[derive(Debug)]
struct DiscoveryMetricsInner {
    /// Total active streams.
    active_streams: AtomicU64,
}

impl Default for DiscoveryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DiscoveryMetricsInner {
                active_streams: AtomicU64::new(0),
            }),
        }
    }

    /// Record an incoming request.
    pub fn record_request(&self, type_url: &str) {
        counter!("kourier_discovery_requests_total", "type_url" => type_url.to_string())
            .increment(1);
    }

    /// Record a response sent with `resources` entries.
    pub fn record_response(&self, type_url: &str, resources: usize) {
        counter!("kourier_discovery_responses_total", "type_url" => type_url.to_string())
            .increment(1);
        histogram!("kourier_discovery_response_resources", "type_url" => type_url.to_string())
            .record(resources as f64);
    }

    /// Record a NACK (negative acknowledgment).
    pub fn record_nack(&self, type_url: &str) {
        counter!("kourier_discovery_nacks_total", "type_url" => type_url.to_string())
            .increment(1);
    }

    /// Record an ACK (acknowledgment).
    pub fn record_ack(&self, type_url: &str) {
        counter!("kourier_discovery_acks_total", "type_url" => type_url.to_string())
            .increment(1);
    }

    /// Record a stream opened.
    pub fn stream_opened(&self) {
        let count = self.inner.active_streams.fetch_add(1, Ordering::Relaxed) + 1;
        counter!("kourier_discovery_streams_opened_total").increment(1);
        gauge!("kourier_discovery_active_streams").set(count as f64);
    }

    /// Record a stream closed.
    pub fn stream_closed(&self, duration: Duration) {
        let count = self
            .inner
            .active_streams
            .fetch_sub(1, Ordering::Relaxed)
            .saturating_sub(1);
        counter!("kourier_discovery_streams_closed_total").increment(1);
        gauge!("kourier_discovery_active_streams").set(count as f64);
        histogram!("kourier_discovery_stream_duration_seconds").record(duration.as_secs_f64());
    }

    /// Get the current number of active streams.
    pub fn active_streams(&self) -> u64 {
        self.inner.active_streams.load(Ordering::Relaxed)
    }
}

/// Stream duration tracker.
///
/// Records the stream as open on creation and as closed, with its
/// duration, when dropped.
#[derive(Debug)]
pub struct StreamTracker {
    start: Instant,
    metrics: DiscoveryMetrics,
}

impl StreamTracker {
    /// Create a new stream tracker.
    pub fn new(metrics: DiscoveryMetrics) -> Self {
        metrics.stream_opened();
        Self {
            start: Instant::now(),
            metrics,
        }
    }
}

impl Drop for StreamTracker {
    fn drop(&mut self) {
        self.metrics.stream_closed(self.start.elapsed());
    }
}
