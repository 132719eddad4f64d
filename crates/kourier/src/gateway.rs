//! Gateway process supervision.
//!
//! The gateway proxy runs as a child process configured solely through the
//! discovery server. Its exit, for whatever reason, is fatal to the control
//! plane: without the proxy there is nothing to configure.

use std::ffi::OsString;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use kourier_core::{KourierError, Result};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// How the gateway process is started and probed.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Executable to run.
    pub binary: PathBuf,
    /// Arguments passed to the executable.
    pub args: Vec<OsString>,
    /// Where the bootstrap is written before the process starts.
    pub bootstrap_path: PathBuf,
    /// Address of the gateway listener probed for readiness.
    pub listener_addr: SocketAddr,
    /// Time the gateway gets to open its listener.
    pub ready_timeout: Duration,
    /// Delay between readiness probes.
    pub probe_interval: Duration,
    /// Time the process gets to exit after termination is requested.
    pub grace_period: Duration,
}

impl GatewayConfig {
    /// Settings for an Envoy binary reading its bootstrap from
    /// `bootstrap_path`.
    pub fn envoy(binary: PathBuf, bootstrap_path: PathBuf, drain_time: Duration) -> Self {
        let args = vec![
            OsString::from("-c"),
            bootstrap_path.clone().into_os_string(),
            OsString::from("--log-level"),
            OsString::from("info"),
            OsString::from("--drain-time-s"),
            OsString::from(drain_time.as_secs().to_string()),
        ];
        Self {
            binary,
            args,
            bootstrap_path,
            listener_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 19001),
            ready_timeout: Duration::from_secs(30),
            probe_interval: Duration::from_millis(500),
            grace_period: Duration::from_secs(5),
        }
    }
}

/// Wait until `addr` accepts TCP connections.
///
/// # Errors
///
/// Returns [`KourierError::Gateway`] if nothing accepts within `timeout`.
pub async fn probe_listener(addr: SocketAddr, timeout: Duration, interval: Duration) -> Result<()> {
    let start = Instant::now();
    loop {
        match TcpStream::connect(addr).await {
            Ok(_) => {
                debug!(addr = %addr, elapsed = ?start.elapsed(), "gateway listener accepts connections");
                return Ok(());
            }
            Err(e) if start.elapsed() >= timeout => {
                return Err(KourierError::gateway(
                    format!("gateway listener {addr} not open after {timeout:?}"),
                    e,
                ));
            }
            Err(e) => debug!(addr = %addr, error = %e, "gateway listener not open yet"),
        }
        tokio::time::sleep(interval).await;
    }
}

/// A running gateway process.
#[derive(Debug)]
pub struct GatewaySupervisor {
    config: GatewayConfig,
    child: Child,
}

impl GatewaySupervisor {
    /// Start the gateway process.
    ///
    /// The process is killed if the supervisor is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`KourierError::Gateway`] if the process cannot be started.
    pub fn spawn(config: GatewayConfig) -> Result<Self> {
        let child = Command::new(&config.binary)
            .args(&config.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                KourierError::gateway(format!("cannot start {}", config.binary.display()), e)
            })?;

        info!(
            binary = %config.binary.display(),
            pid = child.id(),
            "gateway process started"
        );
        Ok(Self { config, child })
    }

    /// OS process ID, while the process runs.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// The supervisor configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Wait until the gateway listener accepts connections.
    ///
    /// # Errors
    ///
    /// Returns [`KourierError::GatewayExited`] if the process exits first,
    /// or [`KourierError::Gateway`] on timeout.
    pub async fn wait_ready(&mut self) -> Result<()> {
        let probe = probe_listener(
            self.config.listener_addr,
            self.config.ready_timeout,
            self.config.probe_interval,
        );
        tokio::select! {
            ready = probe => ready,
            exited = self.exited() => Err(exited),
        }
    }

    /// Wait for the process to exit and describe the exit as an error.
    pub async fn exited(&mut self) -> KourierError {
        match self.child.wait().await {
            Ok(status) => {
                warn!(status = %status, "gateway process exited");
                KourierError::GatewayExited {
                    status: status.to_string(),
                }
            }
            Err(e) => KourierError::gateway("cannot wait for gateway process", e),
        }
    }

    /// Stop the process and return its exit status.
    ///
    /// The gateway gets SIGTERM and the grace period to drain its listeners.
    /// A process still running after that is killed.
    pub async fn terminate(mut self) -> Option<ExitStatus> {
        if let Ok(Some(status)) = self.child.try_wait() {
            debug!(status = %status, "gateway process already exited");
            return Some(status);
        }
        if let Err(e) = self.request_stop() {
            warn!(error = %e, "cannot signal gateway process");
        }
        let grace_period = self.config.grace_period;
        match tokio::time::timeout(grace_period, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!(status = %status, "gateway process stopped");
                return Some(status);
            }
            Ok(Err(e)) => {
                warn!(error = %e, "cannot reap gateway process");
                return None;
            }
            Err(_) => warn!(grace_period = ?grace_period, "gateway process did not stop in time, killing"),
        }
        if let Err(e) = self.child.kill().await {
            warn!(error = %e, "cannot kill gateway process");
        }
        self.child.try_wait().ok().flatten()
    }

    #[cfg(unix)]
    fn request_stop(&mut self) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        let pid = i32::try_from(pid)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        kill(Pid::from_raw(pid), Signal::SIGTERM)?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn request_stop(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }
}
