//! Health service for the gRPC health checking protocol.
//!
//! Integrates `tonic-health` (`grpc.health.v1.Health`). The process
//! reports NOT_SERVING until both the management listener and the gateway
//! listener are open, SERVING afterwards, and NOT_SERVING again while it
//! drains on shutdown.
//!
//! # Example
//!
//! ```rust,ignore
//! use kourier_server::health::HealthService;
//!
//! let (health, health_svc) = HealthService::new();
//! health.set_all_not_serving().await;
//!
//! // ... once every listener is open
//! health.set_all_serving().await;
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;
use tonic_health::pb::health_server::{Health, HealthServer};
use tonic_health::server::HealthReporter;
use tonic_health::ServingStatus;
use tracing::debug;

/// Health service wrapper for the discovery server.
#[derive(Clone)]
pub struct HealthService {
    reporter: Arc<Mutex<HealthReporter>>,
}

impl std::fmt::Debug for HealthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthService").finish()
    }
}

impl HealthService {
    /// Create a new health service and return both the wrapper and the tonic service.
    pub fn new() -> (Self, HealthServer<impl Health>) {
        let (reporter, service) = tonic_health::server::health_reporter();
        let wrapper = Self {
            reporter: Arc::new(Mutex::new(reporter)),
        };
        (wrapper, service)
    }

    /// Mark the process ready.
    pub async fn set_all_serving(&self) {
        self.set_all_status(ServingStatus::Serving).await;
    }

    /// Mark the process not ready (startup and drain).
    pub async fn set_all_not_serving(&self) {
        self.set_all_status(ServingStatus::NotServing).await;
    }

    async fn set_all_status(&self, status: ServingStatus) {
        let mut reporter = self.reporter.lock().await;
        for service in Self::service_names() {
            reporter.set_service_status(service, status).await;
        }
        debug!(status = ?status, "health status changed");
    }

    /// Service names reported by the health service.
    ///
    /// The empty name is the overall server status queried by load
    /// balancers and readiness probes.
    #[inline]
    pub const fn service_names() -> &'static [&'static str] {
        &[
            "",
            kourier_types::envoy::service::discovery::v3::aggregated_discovery_service_server::SERVICE_NAME,
        ]
    }
}
