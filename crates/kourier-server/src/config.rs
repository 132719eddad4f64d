//! Discovery server settings.

use std::time::Duration;

use kourier_core::{KourierError, Result};

/// Largest discovery request accepted from a gateway.
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 4 * 1024 * 1024;

/// Identifier gateways see in the `control_plane` field of responses.
pub const DEFAULT_CONTROL_PLANE_ID: &str = "kourier";

/// Transport and stream settings of the discovery server.
///
/// A single gateway opens one connection carrying one ADS stream, so the
/// per-connection limits only guard against misbehaving clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// HTTP/2 streams accepted per connection.
    pub max_concurrent_streams: Option<u32>,
    /// HTTP/2 ping interval; detects gateways that vanished without closing.
    pub keepalive_interval: Option<Duration>,
    /// How long a ping may go unanswered.
    pub keepalive_timeout: Option<Duration>,
    /// Largest decoded request in bytes.
    pub max_request_size: usize,
    /// Responses queued per stream before the stream task waits on the gateway.
    pub response_buffer_size: usize,
    /// How long open streams get to finish once shutdown starts.
    pub grace_period: Duration,
    /// Reported in every response.
    pub control_plane_id: String,
}

impl ServerConfig {
    /// Reject settings the server cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`KourierError::Configuration`] for zero-sized buffers.
    pub fn validate(&self) -> Result<()> {
        if self.response_buffer_size == 0 {
            return Err(KourierError::Configuration(
                "response buffer size must be greater than zero".into(),
            ));
        }
        if self.max_request_size == 0 {
            return Err(KourierError::Configuration(
                "maximum request size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_streams: Some(100),
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_timeout: Some(Duration::from_secs(10)),
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            response_buffer_size: 16,
            grace_period: Duration::from_secs(5),
            control_plane_id: DEFAULT_CONTROL_PLANE_ID.to_string(),
        }
    }
}
