//! gRPC service implementations.
//!
//! Gateways receive every resource type over the Aggregated Discovery
//! Service, so ADS is the only discovery service registered.

pub mod ads;

pub use ads::{AdsConfig, AdsResponseStream, AdsService};
pub use kourier_types::envoy::service::discovery::v3::aggregated_discovery_service_server::{
    AggregatedDiscoveryService, AggregatedDiscoveryServiceServer,
};
