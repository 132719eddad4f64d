//! Process wiring.
//!
//! Starts the discovery server, the reconciliation workers, the optional
//! rules file watcher and the gateway process, then waits for a shutdown
//! signal or a fatal failure:
//!
//! - the discovery server stopping is fatal
//! - the gateway process exiting is fatal
//! - reconciliation failures never are; the workers retry them
//!
//! Health turns SERVING only once the management listener is bound and the
//! gateway listener accepts connections.

use std::future::Future;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use kourier_cache::SnapshotCache;
use kourier_controller::{
    Controller, EventSink, FileWatcher, InMemoryWatcher, IngressReconciler, ResourceWatcher,
    TracingEventSink, Translator, WorkQueue, RECONCILE_KEY,
};
use kourier_core::KourierError;
use kourier_server::shutdown::wait_for_signal;
use kourier_server::{DiscoveryServer, ShutdownController};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::gateway::GatewaySupervisor;

/// Why the process is stopping.
enum Stop {
    Requested,
    Failed(anyhow::Error),
}

/// Run until SIGTERM/SIGINT or a fatal failure.
pub async fn run(config: Config) -> Result<()> {
    run_until(config, wait_for_signal()).await
}

/// Run until `stop` completes or a fatal failure occurs.
pub async fn run_until<F>(config: Config, stop: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    config.validate()?;
    let node = config.node();
    let grace_period = config.grace_period();

    let cache = Arc::new(SnapshotCache::with_version_base(version_base()));
    let shutdown = ShutdownController::new();

    let server = DiscoveryServer::builder()
        .cache(Arc::clone(&cache))
        .shutdown_controller(shutdown.clone())
        .grace_period(grace_period)
        .build()?;
    let health = server.health().clone();
    health.set_all_not_serving().await;
    let listener = server.bind(config.management_socket()).await?;
    let management = listener
        .local_addr()
        .map_err(|e| KourierError::internal("listener has no local address", e))?;

    let events: Arc<dyn EventSink> = Arc::new(TracingEventSink);
    let queue = WorkQueue::new(config.queue_config());
    let file_watcher = config.rules_file.as_ref().map(FileWatcher::new);
    let watcher: Arc<dyn ResourceWatcher> = match &file_watcher {
        Some(file) => Arc::new(file.clone()),
        None => {
            warn!("no rules file configured; serving an empty route table");
            Arc::new(InMemoryWatcher::new())
        }
    };
    let reconciler = Arc::new(IngressReconciler::new(
        watcher,
        Translator::new(config.translator_config()),
        Arc::clone(&cache),
        node.clone(),
        Arc::clone(&events),
    ));
    let controller = Controller::new(
        queue.clone(),
        reconciler,
        events,
        config.controller_config(),
    );

    // first reconciliation publishes the initial snapshot
    queue.add(RECONCILE_KEY);

    let mut server_task = tokio::spawn(server.serve_with_listener(listener));
    let controller_task = tokio::spawn(controller.run(shutdown.shutdown_signal().wait()));
    let file_task = file_watcher.map(|file| {
        let queue = queue.clone();
        let signal = shutdown.shutdown_signal();
        let poll = config.poll_interval();
        tokio::spawn(async move {
            if let Err(e) = file
                .watch_changes(queue, RECONCILE_KEY, poll, signal.wait())
                .await
            {
                error!(error = %e, "rules file changes will not be picked up");
            }
        })
    });

    let mut gateway = if config.no_gateway {
        info!("gateway process disabled");
        None
    } else {
        let gateway_config = config.gateway_config();
        config
            .bootstrap_config(management)
            .write_to(&gateway_config.bootstrap_path)
            .await?;
        Some(GatewaySupervisor::spawn(gateway_config)?)
    };

    tokio::pin!(stop);
    let mut server_running = true;

    let startup = async {
        if let Some(gateway) = gateway.as_mut() {
            gateway.wait_ready().await?;
        }
        health.set_all_serving().await;
        Ok::<_, KourierError>(())
    };

    let mut outcome = tokio::select! {
        ready = startup => match ready {
            Ok(()) => {
                info!(node_id = %node, management = %management, "kourier ready");
                None
            }
            Err(e) => Some(Stop::Failed(e.into())),
        },
        result = &mut server_task => {
            server_running = false;
            Some(Stop::Failed(server_stopped(result)))
        }
        _ = &mut stop => Some(Stop::Requested),
    };

    if outcome.is_none() {
        outcome = Some(tokio::select! {
            result = &mut server_task => {
                server_running = false;
                Stop::Failed(server_stopped(result))
            }
            exited = gateway_exit(&mut gateway) => Stop::Failed(exited.into()),
            _ = &mut stop => Stop::Requested,
        });
    }

    let result = match outcome {
        Some(Stop::Failed(e)) => {
            error!(error = %e, "fatal failure, shutting down");
            Err(e)
        }
        _ => {
            info!("shutdown requested");
            Ok(())
        }
    };

    let drained = shutdown.shutdown(grace_period).await;
    if !drained {
        warn!(grace_period = ?grace_period, "discovery streams still open after grace period");
    }
    if let Some(gateway) = gateway.take() {
        gateway.terminate().await;
    }

    log_join("controller", controller_task).await;
    if let Some(task) = file_task {
        log_join("rules file watcher", task).await;
    }
    if server_running {
        match tokio::time::timeout(grace_period, server_task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(error = %e, "discovery server stopped with error"),
            Ok(Err(e)) => warn!(error = %e, "discovery server task failed"),
            Err(_) => warn!("discovery server did not stop in time"),
        }
    }

    info!("kourier stopped");
    result
}

/// Base for snapshot versions: milliseconds since the Unix epoch.
///
/// Versions issued after a restart then exceed those a reconnecting proxy
/// still holds.
pub fn version_base() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

async fn gateway_exit(gateway: &mut Option<GatewaySupervisor>) -> KourierError {
    match gateway {
        Some(gateway) => gateway.exited().await,
        None => std::future::pending().await,
    }
}

fn server_stopped(result: std::result::Result<kourier_core::Result<()>, JoinError>) -> anyhow::Error {
    match result {
        Ok(Ok(())) => anyhow!("discovery server stopped unexpectedly"),
        Ok(Err(e)) => anyhow::Error::new(e).context("discovery server failed"),
        Err(e) => anyhow::Error::new(e).context("discovery server task failed"),
    }
}

async fn log_join(name: &str, task: JoinHandle<()>) {
    if let Err(e) = task.await.with_context(|| format!("{name} task failed")) {
        warn!(error = %e, "{name} did not stop cleanly");
    }
}
