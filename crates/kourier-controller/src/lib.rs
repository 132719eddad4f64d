//! # kourier-controller
//!
//! Turns routing intent into gateway configuration.
//!
//! - [`ResourceWatcher`] - Full-pull source of rules and backends
//! - [`WorkQueue`] - Deduplicating queue of pending reconciliations
//! - [`Controller`] - Worker pool deciding retry, backoff and drop
//! - [`Translator`] - Pure mapping from rules and backends to a snapshot
//! - [`IngressReconciler`] - Pull, translate, publish
//! - [`EventSink`] - Receiver of reconcile outcomes and version changes
//!
//! ## Flow
//!
//! ```text
//! watcher ──add(key)──► WorkQueue ──► Controller worker
//!                                         │
//!                                         ▼
//!                               IngressReconciler::reconcile
//!                         current_state → translate → set_snapshot
//! ```
//!
//! Reconciliation is level-triggered: whichever key was added, the worker
//! rebuilds the whole configuration from the current state.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod controller;
pub mod events;
mod model;
mod queue;
mod reconciler;
pub mod translator;
mod watcher;

pub use controller::{Controller, ControllerConfig};
pub use events::{ControllerEvent, EventSink, RecordingEventSink, TracingEventSink};
pub use model::{Backend, BackendRef, ClusterState, EndpointAddress, ObjectKey, RouteRule};
pub use queue::{QueueConfig, Retry, WorkQueue};
pub use reconciler::{IngressReconciler, Reconciler};
pub use translator::{RouteConflict, Translation, Translator, TranslatorConfig};
pub use watcher::{FileWatcher, InMemoryWatcher, ResourceWatcher};

/// Queue key used for every change notification.
///
/// Reconciliation always covers the complete state, so one key suffices.
pub const RECONCILE_KEY: &str = "kourier/ingresses";
