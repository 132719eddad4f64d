//! # kourier-cache
//!
//! Versioned snapshot cache for the kourier control plane.
//!
//! - [`SnapshotCache`] - Per-node store of the latest published snapshot
//! - [`Snapshot`] - Immutable, name-ordered collection of encoded resources
//! - [`Watch`] - Subscription to a node's publications
//!
//! ## Key Design Decisions
//!
//! - Versions are issued by the cache, never by the producer of a snapshot
//! - Per node and per resource type, versions only ever increase
//! - Publishing identical content is a no-op
//! - Reads go through `ArcSwapOption` and never wait on a writer
//!
//! ## Example
//!
//! ```rust
//! use kourier_cache::{Cache, Snapshot, SnapshotCache};
//! use kourier_core::{NodeHash, ResourceType};
//!
//! let cache = SnapshotCache::new();
//! let node = NodeHash::from_id("3scale-kourier-gateway");
//!
//! cache.set_snapshot(node, Snapshot::builder().build());
//!
//! let snapshot = cache.get_snapshot(node).unwrap();
//! assert_eq!(snapshot.get_version(ResourceType::Listener).to_string(), "1");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod snapshot;
mod stats;
mod watch;

pub use cache::{Cache, SetOutcome, SnapshotCache};
pub use snapshot::{Snapshot, SnapshotBuilder, SnapshotResources};
pub use stats::CacheStats;
pub use watch::{Watch, WatchId};
