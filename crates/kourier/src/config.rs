//! Process configuration.
//!
//! Every setting comes from a command-line flag with a `KOURIER_*`
//! environment fallback. The parsed [`Config`] is turned into the plain
//! configuration structs of the library crates; nothing reads process
//! state after startup.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use kourier_controller::{ControllerConfig, QueueConfig, TranslatorConfig};
use kourier_core::{GatewayNode, KourierError, Result};

use crate::bootstrap::BootstrapConfig;
use crate::gateway::GatewayConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// Command-line configuration of the control plane.
#[derive(Debug, Clone, Parser)]
#[command(name = "kourier", version, about = "Ingress-to-proxy control plane")]
pub struct Config {
    /// Node ID of the gateway proxy; the proxy only receives configuration
    /// published under this ID.
    #[arg(long, env = "KOURIER_NODE_ID", default_value = GatewayNode::DEFAULT_ID)]
    pub node_id: String,

    /// Port the gateway's HTTP listener binds.
    #[arg(long, env = "KOURIER_GATEWAY_PORT", default_value_t = 19001)]
    pub gateway_port: u16,

    /// Address the discovery server binds.
    #[arg(long, env = "KOURIER_MANAGEMENT_ADDR", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub management_addr: IpAddr,

    /// Port the discovery server binds.
    #[arg(long, env = "KOURIER_MANAGEMENT_PORT", default_value_t = 18000)]
    pub management_port: u16,

    /// Number of reconciliation workers.
    #[arg(long, env = "KOURIER_WORKERS", default_value_t = 2)]
    pub workers: usize,

    /// Consecutive failures after which a key is dropped.
    #[arg(long, env = "KOURIER_MAX_RETRIES", default_value_t = 10)]
    pub max_retries: u32,

    /// First retry delay in milliseconds.
    #[arg(long, env = "KOURIER_BACKOFF_BASE_MS", default_value_t = 10)]
    pub backoff_base_ms: u64,

    /// Upper bound of the retry delay in milliseconds.
    #[arg(long, env = "KOURIER_BACKOFF_MAX_MS", default_value_t = 30_000)]
    pub backoff_max_ms: u64,

    /// JSON file with the routing rules and backends.
    #[arg(long, env = "KOURIER_RULES_FILE")]
    pub rules_file: Option<PathBuf>,

    /// Poll the rules file at this interval, in milliseconds, instead of
    /// relying on filesystem events.
    #[arg(long, env = "KOURIER_POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Path of the proxy binary.
    #[arg(long, env = "KOURIER_ENVOY_BINARY", default_value = "envoy")]
    pub envoy_binary: PathBuf,

    /// Port of the proxy's admin listener, bound on localhost.
    #[arg(long, env = "KOURIER_ENVOY_ADMIN_PORT", default_value_t = 9901)]
    pub envoy_admin_port: u16,

    /// Where the proxy bootstrap is written.
    #[arg(long, env = "KOURIER_BOOTSTRAP_PATH")]
    pub bootstrap_path: Option<PathBuf>,

    /// Run the control plane without starting the gateway proxy.
    #[arg(long, env = "KOURIER_NO_GATEWAY")]
    pub no_gateway: bool,

    /// Seconds the gateway gets to open its listener.
    #[arg(long, env = "KOURIER_GATEWAY_READY_TIMEOUT", default_value_t = 30)]
    pub gateway_ready_timeout_secs: u64,

    /// Seconds streams, workers and the proxy get to stop on shutdown.
    #[arg(long, env = "KOURIER_GRACE_PERIOD", default_value_t = 5)]
    pub grace_period_secs: u64,

    /// Log output format.
    #[arg(long, env = "KOURIER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

impl Config {
    /// Check settings that parse but cannot work together.
    ///
    /// # Errors
    ///
    /// Returns [`KourierError::Configuration`] naming the first problem.
    pub fn validate(&self) -> Result<()> {
        if self.node_id.trim().is_empty() {
            return Err(KourierError::Configuration("node ID must not be empty".into()));
        }
        if self.workers == 0 {
            return Err(KourierError::Configuration(
                "at least one worker is required".into(),
            ));
        }
        if self.gateway_port == self.management_port {
            return Err(KourierError::Configuration(format!(
                "gateway and management listeners both use port {}",
                self.gateway_port
            )));
        }
        if !self.no_gateway
            && (self.envoy_admin_port == self.gateway_port
                || self.envoy_admin_port == self.management_port)
        {
            return Err(KourierError::Configuration(format!(
                "admin port {} collides with another listener",
                self.envoy_admin_port
            )));
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(KourierError::Configuration(
                "backoff base must not exceed backoff maximum".into(),
            ));
        }
        Ok(())
    }

    /// The gateway node configuration is published for.
    pub fn node(&self) -> GatewayNode {
        GatewayNode::new(&self.node_id)
    }

    /// Address of the discovery server.
    pub fn management_socket(&self) -> SocketAddr {
        SocketAddr::new(self.management_addr, self.management_port)
    }

    /// Shutdown grace period.
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// Rules file poll interval, when polling replaces filesystem events.
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms.map(|ms| Duration::from_millis(ms.max(1)))
    }

    /// Work queue settings.
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms),
            max_retries: self.max_retries,
        }
    }

    /// Worker pool settings.
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            workers: self.workers,
            grace_period: self.grace_period(),
        }
    }

    /// Translator settings.
    pub fn translator_config(&self) -> TranslatorConfig {
        TranslatorConfig {
            gateway_port: self.gateway_port,
            ..TranslatorConfig::default()
        }
    }

    /// Bootstrap handed to the gateway proxy.
    ///
    /// `bound` is the discovery server's listening address, so an ephemeral
    /// management port reaches the proxy as the port actually in use. The
    /// proxy dials loopback unless the server is bound to a specific address.
    pub fn bootstrap_config(&self, bound: SocketAddr) -> BootstrapConfig {
        let host = if bound.ip().is_unspecified() {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            bound.ip()
        };
        BootstrapConfig {
            node_id: self.node_id.clone(),
            management_address: SocketAddr::new(host, bound.port()),
            admin_port: self.envoy_admin_port,
            ..BootstrapConfig::default()
        }
    }

    /// Gateway process settings.
    pub fn gateway_config(&self) -> GatewayConfig {
        let bootstrap_path = self
            .bootstrap_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("kourier-bootstrap.json"));
        let mut config = GatewayConfig::envoy(
            self.envoy_binary.clone(),
            bootstrap_path,
            self.grace_period(),
        );
        config.listener_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.gateway_port);
        config.ready_timeout = Duration::from_secs(self.gateway_ready_timeout_secs);
        config.grace_period = self.grace_period();
        config
    }
}
