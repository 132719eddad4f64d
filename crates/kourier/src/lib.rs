//! # kourier
//!
//! Ingress-to-proxy control plane.
//!
//! Reads routing rules and backends, translates them into listeners, route
//! tables, clusters and load assignments, and serves the result to a
//! supervised gateway proxy over the Aggregated Discovery Service.
//!
//! This crate wires the library crates into a process and re-exports them:
//!
//! - `kourier-core` - Errors, versions, node identity, resource types
//! - `kourier-cache` - Per-node snapshot cache with change notification
//! - `kourier-server` - ADS gRPC server, health and graceful shutdown
//! - `kourier-controller` - Work queue, workers, translator, reconciler
//! - `kourier-types` - Protobuf messages of the published resources
//!
//! ## Running
//!
//! ```text
//! kourier --rules-file /etc/kourier/rules.json --envoy-binary /usr/local/bin/envoy
//! ```
//!
//! Every flag also reads a `KOURIER_*` environment variable; see
//! [`config::Config`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod gateway;
pub mod telemetry;

pub use kourier_cache as cache;
pub use kourier_controller as controller;
pub use kourier_core as core;
pub use kourier_server as server;
pub use kourier_types as types;

/// Prelude module for convenient imports.
///
/// ```rust
/// use kourier::prelude::*;
///
/// let node = GatewayNode::new("edge");
/// let cache = SnapshotCache::new();
/// assert!(cache.get_snapshot(node.hash()).is_none());
/// ```
pub mod prelude {
    pub use kourier_core::{
        BoxResource, GatewayNode, KourierError, NodeHash, ProtoResource, Resource, ResourceType,
        ResourceVersion, Result, TypeUrl,
    };

    pub use kourier_cache::{Cache, SetOutcome, Snapshot, SnapshotBuilder, SnapshotCache};

    pub use kourier_server::{DiscoveryServer, DiscoveryServerBuilder, ShutdownController};

    pub use kourier_controller::{
        Backend, BackendRef, ClusterState, Controller, EndpointAddress, IngressReconciler,
        ResourceWatcher, RouteRule, Translator, WorkQueue,
    };
}

/// Version information for this crate.
pub mod version {
    /// Crate version.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Minimum supported Rust version.
    pub const MSRV: &str = "1.75";

    /// Get version info as a string.
    pub fn version_string() -> String {
        format!("kourier {} (MSRV {})", VERSION, MSRV)
    }
}
