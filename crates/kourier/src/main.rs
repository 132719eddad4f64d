//! kourier control plane binary.
//!
//! ## Running
//!
//! ```bash
//! kourier --rules-file rules.json --envoy-binary envoy
//! RUST_LOG=kourier=debug kourier --no-gateway --log-format pretty
//! ```

use clap::Parser;
use kourier::config::Config;
use kourier::{app, telemetry, version};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    telemetry::init(config.log_format)?;

    info!(
        version = version::VERSION,
        node_id = %config.node_id,
        gateway_port = config.gateway_port,
        management = %config.management_socket(),
        "starting kourier"
    );

    if let Err(e) = app::run(config).await {
        error!(error = %format!("{e:#}"), "kourier exited with error");
        return Err(e);
    }
    Ok(())
}
