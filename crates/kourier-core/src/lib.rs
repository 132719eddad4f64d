//! # kourier-core
//!
//! Core types, traits, and error handling shared by every kourier crate.
//!
//! - [`KourierError`] - Error taxonomy with gRPC status mapping
//! - [`ResourceVersion`] - Monotonic per-type snapshot versions
//! - [`NodeHash`] / [`GatewayNode`] - Gateway node identification
//! - [`Resource`] - Trait for anything that can be published in a snapshot
//! - [`TypeUrl`] / [`ResourceType`] - The four discovery resource types
//!
//! ## Example
//!
//! ```rust
//! use kourier_core::{GatewayNode, ResourceType, ResourceVersion};
//!
//! let node = GatewayNode::new("3scale-kourier-gateway");
//! assert_eq!(node.id(), "3scale-kourier-gateway");
//!
//! let version = ResourceVersion::new(7);
//! assert_eq!(version.to_string(), "7");
//!
//! assert_eq!(ResourceType::Cluster.short_name(), "Cluster");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod node;
mod resource;
mod type_url;
mod version;

pub use error::KourierError;
pub use node::{GatewayNode, NodeHash};
pub use resource::{BoxResource, ProtoResource, Resource};
pub use type_url::{ResourceType, TypeUrl};
pub use version::ResourceVersion;

/// Result type alias using [`KourierError`].
pub type Result<T> = std::result::Result<T, KourierError>;
