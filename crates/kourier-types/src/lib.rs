//! # kourier-types
//!
//! Protobuf messages for the subset of the Envoy v3 API the control plane
//! publishes, plus the gRPC glue for the Aggregated Discovery Service.
//!
//! Messages carry the field numbers of the upstream Envoy protos, so they
//! are wire compatible with a stock Envoy. Only the fields the control
//! plane sets are declared; unknown fields sent by a proxy are skipped on
//! decode.
//!
//! Module paths mirror the protobuf packages:
//!
//! - [`envoy::service::discovery::v3`] - `DiscoveryRequest`, `DiscoveryResponse`, ADS
//! - [`envoy::config::listener::v3`] - `Listener`
//! - [`envoy::config::route::v3`] - `RouteConfiguration`
//! - [`envoy::config::cluster::v3`] - `Cluster`
//! - [`envoy::config::endpoint::v3`] - `ClusterLoadAssignment`
//! - [`google::rpc`] - `Status`

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)] // Message fields mirror the Envoy protos
#![allow(clippy::derive_partial_eq_without_eq)]

pub use prost::Message;
pub use prost_types::{Any, Duration};

mod ads;

pub mod google {
    //! Google well-known RPC types.

    pub mod rpc {
        //! `google.rpc` package.

        /// `google.rpc.Status`, carried in `DiscoveryRequest.error_detail` on NACK.
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Status {
            #[prost(int32, tag = "1")]
            pub code: i32,
            #[prost(string, tag = "2")]
            pub message: ::prost::alloc::string::String,
            #[prost(message, repeated, tag = "3")]
            pub details: ::prost::alloc::vec::Vec<::prost_types::Any>,
        }
    }
}

pub mod envoy {
    //! Envoy v3 API types.

    pub mod config {
        //! `envoy.config.*` packages.

        pub mod core {
            //! `envoy.config.core`.

            pub mod v3 {
                //! `envoy.config.core.v3`.

                /// Identity of a proxy instance.
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct Node {
                    #[prost(string, tag = "1")]
                    pub id: ::prost::alloc::string::String,
                    #[prost(string, tag = "2")]
                    pub cluster: ::prost::alloc::string::String,
                }

                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct ControlPlane {
                    #[prost(string, tag = "1")]
                    pub identifier: ::prost::alloc::string::String,
                }

                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct Address {
                    #[prost(oneof = "address::Address", tags = "1")]
                    pub address: ::core::option::Option<address::Address>,
                }

                pub mod address {
                    #[derive(Clone, PartialEq, ::prost::Oneof)]
                    pub enum Address {
                        #[prost(message, tag = "1")]
                        SocketAddress(super::SocketAddress),
                    }
                }

                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct SocketAddress {
                    #[prost(enumeration = "socket_address::Protocol", tag = "1")]
                    pub protocol: i32,
                    #[prost(string, tag = "2")]
                    pub address: ::prost::alloc::string::String,
                    #[prost(uint32, tag = "3")]
                    pub port_value: u32,
                }

                pub mod socket_address {
                    #[derive(
                        Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
                    )]
                    #[repr(i32)]
                    pub enum Protocol {
                        Tcp = 0,
                        Udp = 1,
                    }
                }

                /// Marker selecting the aggregated (ADS) stream as config source.
                #[derive(Clone, Copy, PartialEq, ::prost::Message)]
                pub struct AggregatedConfigSource {}

                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct ConfigSource {
                    #[prost(oneof = "config_source::ConfigSourceSpecifier", tags = "3")]
                    pub config_source_specifier:
                        ::core::option::Option<config_source::ConfigSourceSpecifier>,
                    #[prost(message, optional, tag = "4")]
                    pub initial_fetch_timeout: ::core::option::Option<::prost_types::Duration>,
                    #[prost(enumeration = "ApiVersion", tag = "6")]
                    pub resource_api_version: i32,
                }

                pub mod config_source {
                    #[derive(Clone, PartialEq, ::prost::Oneof)]
                    pub enum ConfigSourceSpecifier {
                        #[prost(message, tag = "3")]
                        Ads(super::AggregatedConfigSource),
                    }
                }

                #[derive(
                    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
                )]
                #[repr(i32)]
                pub enum ApiVersion {
                    Auto = 0,
                    V2 = 1,
                    V3 = 2,
                }

                #[derive(
                    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
                )]
                #[repr(i32)]
                pub enum HealthStatus {
                    Unknown = 0,
                    Healthy = 1,
                    Unhealthy = 2,
                    Draining = 3,
                    Timeout = 4,
                    Degraded = 5,
                }
            }
        }

        pub mod cluster {
            //! `envoy.config.cluster`.

            pub mod v3 {
                //! `envoy.config.cluster.v3`.

                use super::super::core::v3::ConfigSource;

                /// Upstream cluster.
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct Cluster {
                    #[prost(string, tag = "1")]
                    pub name: ::prost::alloc::string::String,
                    #[prost(enumeration = "cluster::DiscoveryType", tag = "2")]
                    pub r#type: i32,
                    #[prost(message, optional, tag = "3")]
                    pub eds_cluster_config: ::core::option::Option<cluster::EdsClusterConfig>,
                    #[prost(message, optional, tag = "4")]
                    pub connect_timeout: ::core::option::Option<::prost_types::Duration>,
                    #[prost(enumeration = "cluster::LbPolicy", tag = "6")]
                    pub lb_policy: i32,
                }

                pub mod cluster {
                    use super::ConfigSource;

                    #[derive(Clone, PartialEq, ::prost::Message)]
                    pub struct EdsClusterConfig {
                        #[prost(message, optional, tag = "1")]
                        pub eds_config: ::core::option::Option<ConfigSource>,
                        #[prost(string, tag = "2")]
                        pub service_name: ::prost::alloc::string::String,
                    }

                    #[derive(
                        Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
                    )]
                    #[repr(i32)]
                    pub enum DiscoveryType {
                        Static = 0,
                        StrictDns = 1,
                        LogicalDns = 2,
                        Eds = 3,
                        OriginalDst = 4,
                    }

                    #[derive(
                        Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
                    )]
                    #[repr(i32)]
                    pub enum LbPolicy {
                        RoundRobin = 0,
                        LeastRequest = 1,
                        RingHash = 2,
                        Random = 3,
                    }
                }
            }
        }

        pub mod endpoint {
            //! `envoy.config.endpoint`.

            pub mod v3 {
                //! `envoy.config.endpoint.v3`.

                use super::super::core::v3::Address;

                /// Endpoints of one cluster.
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct ClusterLoadAssignment {
                    #[prost(string, tag = "1")]
                    pub cluster_name: ::prost::alloc::string::String,
                    #[prost(message, repeated, tag = "2")]
                    pub endpoints: ::prost::alloc::vec::Vec<LocalityLbEndpoints>,
                }

                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct LocalityLbEndpoints {
                    #[prost(message, repeated, tag = "2")]
                    pub lb_endpoints: ::prost::alloc::vec::Vec<LbEndpoint>,
                }

                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct LbEndpoint {
                    #[prost(oneof = "lb_endpoint::HostIdentifier", tags = "1")]
                    pub host_identifier: ::core::option::Option<lb_endpoint::HostIdentifier>,
                    #[prost(
                        enumeration = "super::super::core::v3::HealthStatus",
                        tag = "2"
                    )]
                    pub health_status: i32,
                }

                pub mod lb_endpoint {
                    #[derive(Clone, PartialEq, ::prost::Oneof)]
                    pub enum HostIdentifier {
                        #[prost(message, tag = "1")]
                        Endpoint(super::Endpoint),
                    }
                }

                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct Endpoint {
                    #[prost(message, optional, tag = "1")]
                    pub address: ::core::option::Option<Address>,
                }
            }
        }

        pub mod listener {
            //! `envoy.config.listener`.

            pub mod v3 {
                //! `envoy.config.listener.v3`.

                use super::super::core::v3::Address;

                /// Downstream listener.
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct Listener {
                    #[prost(string, tag = "1")]
                    pub name: ::prost::alloc::string::String,
                    #[prost(message, optional, tag = "2")]
                    pub address: ::core::option::Option<Address>,
                    #[prost(message, repeated, tag = "3")]
                    pub filter_chains: ::prost::alloc::vec::Vec<FilterChain>,
                }

                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct FilterChain {
                    #[prost(message, repeated, tag = "3")]
                    pub filters: ::prost::alloc::vec::Vec<Filter>,
                    #[prost(string, tag = "7")]
                    pub name: ::prost::alloc::string::String,
                }

                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct Filter {
                    #[prost(string, tag = "1")]
                    pub name: ::prost::alloc::string::String,
                    #[prost(oneof = "filter::ConfigType", tags = "4")]
                    pub config_type: ::core::option::Option<filter::ConfigType>,
                }

                pub mod filter {
                    #[derive(Clone, PartialEq, ::prost::Oneof)]
                    pub enum ConfigType {
                        #[prost(message, tag = "4")]
                        TypedConfig(::prost_types::Any),
                    }
                }
            }
        }

        pub mod route {
            //! `envoy.config.route`.

            pub mod v3 {
                //! `envoy.config.route.v3`.

                /// Route table.
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct RouteConfiguration {
                    #[prost(string, tag = "1")]
                    pub name: ::prost::alloc::string::String,
                    #[prost(message, repeated, tag = "2")]
                    pub virtual_hosts: ::prost::alloc::vec::Vec<VirtualHost>,
                }

                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct VirtualHost {
                    #[prost(string, tag = "1")]
                    pub name: ::prost::alloc::string::String,
                    #[prost(string, repeated, tag = "2")]
                    pub domains: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
                    #[prost(message, repeated, tag = "3")]
                    pub routes: ::prost::alloc::vec::Vec<Route>,
                }

                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct Route {
                    #[prost(message, optional, tag = "1")]
                    pub r#match: ::core::option::Option<RouteMatch>,
                    #[prost(oneof = "route::Action", tags = "2")]
                    pub action: ::core::option::Option<route::Action>,
                    #[prost(string, tag = "14")]
                    pub name: ::prost::alloc::string::String,
                }

                pub mod route {
                    #[derive(Clone, PartialEq, ::prost::Oneof)]
                    pub enum Action {
                        #[prost(message, tag = "2")]
                        Route(super::RouteAction),
                    }
                }

                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct RouteMatch {
                    #[prost(oneof = "route_match::PathSpecifier", tags = "1, 2")]
                    pub path_specifier: ::core::option::Option<route_match::PathSpecifier>,
                }

                pub mod route_match {
                    #[derive(Clone, PartialEq, ::prost::Oneof)]
                    pub enum PathSpecifier {
                        #[prost(string, tag = "1")]
                        Prefix(::prost::alloc::string::String),
                        #[prost(string, tag = "2")]
                        Path(::prost::alloc::string::String),
                    }
                }

                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct RouteAction {
                    #[prost(oneof = "route_action::ClusterSpecifier", tags = "1, 3")]
                    pub cluster_specifier: ::core::option::Option<route_action::ClusterSpecifier>,
                    #[prost(message, optional, tag = "8")]
                    pub timeout: ::core::option::Option<::prost_types::Duration>,
                }

                pub mod route_action {
                    #[derive(Clone, PartialEq, ::prost::Oneof)]
                    pub enum ClusterSpecifier {
                        #[prost(string, tag = "1")]
                        Cluster(::prost::alloc::string::String),
                        #[prost(message, tag = "3")]
                        WeightedClusters(super::WeightedCluster),
                    }
                }

                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct WeightedCluster {
                    #[prost(message, repeated, tag = "1")]
                    pub clusters: ::prost::alloc::vec::Vec<weighted_cluster::ClusterWeight>,
                }

                pub mod weighted_cluster {
                    #[derive(Clone, PartialEq, ::prost::Message)]
                    pub struct ClusterWeight {
                        #[prost(string, tag = "1")]
                        pub name: ::prost::alloc::string::String,
                        #[prost(message, optional, tag = "2")]
                        pub weight: ::core::option::Option<u32>,
                    }
                }
            }
        }
    }

    pub mod extensions {
        //! `envoy.extensions.*` packages.

        pub mod filters {
            //! Network and HTTP filter configs.

            pub mod network {
                //! Network filters.

                pub mod http_connection_manager {
                    //! `envoy.extensions.filters.network.http_connection_manager`.

                    pub mod v3 {
                        //! `envoy.extensions.filters.network.http_connection_manager.v3`.

                        use crate::envoy::config::core::v3::ConfigSource;

                        #[derive(Clone, PartialEq, ::prost::Message)]
                        pub struct HttpConnectionManager {
                            #[prost(
                                enumeration = "http_connection_manager::CodecType",
                                tag = "1"
                            )]
                            pub codec_type: i32,
                            #[prost(string, tag = "2")]
                            pub stat_prefix: ::prost::alloc::string::String,
                            #[prost(
                                oneof = "http_connection_manager::RouteSpecifier",
                                tags = "3"
                            )]
                            pub route_specifier:
                                ::core::option::Option<http_connection_manager::RouteSpecifier>,
                            #[prost(message, repeated, tag = "5")]
                            pub http_filters: ::prost::alloc::vec::Vec<HttpFilter>,
                        }

                        pub mod http_connection_manager {
                            #[derive(Clone, PartialEq, ::prost::Oneof)]
                            pub enum RouteSpecifier {
                                #[prost(message, tag = "3")]
                                Rds(super::Rds),
                            }

                            #[derive(
                                Clone,
                                Copy,
                                Debug,
                                PartialEq,
                                Eq,
                                Hash,
                                PartialOrd,
                                Ord,
                                ::prost::Enumeration,
                            )]
                            #[repr(i32)]
                            pub enum CodecType {
                                Auto = 0,
                                Http1 = 1,
                                Http2 = 2,
                            }
                        }

                        #[derive(Clone, PartialEq, ::prost::Message)]
                        pub struct Rds {
                            #[prost(message, optional, tag = "1")]
                            pub config_source: ::core::option::Option<ConfigSource>,
                            #[prost(string, tag = "2")]
                            pub route_config_name: ::prost::alloc::string::String,
                        }

                        #[derive(Clone, PartialEq, ::prost::Message)]
                        pub struct HttpFilter {
                            #[prost(string, tag = "1")]
                            pub name: ::prost::alloc::string::String,
                            #[prost(oneof = "http_filter::ConfigType", tags = "4")]
                            pub config_type: ::core::option::Option<http_filter::ConfigType>,
                        }

                        pub mod http_filter {
                            #[derive(Clone, PartialEq, ::prost::Oneof)]
                            pub enum ConfigType {
                                #[prost(message, tag = "4")]
                                TypedConfig(::prost_types::Any),
                            }
                        }
                    }
                }
            }

            pub mod http {
                //! HTTP filters.

                pub mod router {
                    //! `envoy.extensions.filters.http.router`.

                    pub mod v3 {
                        //! `envoy.extensions.filters.http.router.v3`.

                        #[derive(Clone, Copy, PartialEq, ::prost::Message)]
                        pub struct Router {}
                    }
                }
            }
        }
    }

    pub mod service {
        //! Envoy discovery service definitions.

        pub mod discovery {
            //! `envoy.service.discovery`.

            pub mod v3 {
                //! Discovery service v3 API.

                pub use crate::ads::aggregated_discovery_service_client;
                pub use crate::ads::aggregated_discovery_service_server;

                use crate::envoy::config::core::v3::{ControlPlane, Node};

                /// Discovery request sent by proxies.
                ///
                /// A request whose `response_nonce` matches the last response is an
                /// ACK when `error_detail` is unset and a NACK when it is set.
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct DiscoveryRequest {
                    #[prost(string, tag = "1")]
                    pub version_info: ::prost::alloc::string::String,
                    #[prost(message, optional, tag = "2")]
                    pub node: ::core::option::Option<Node>,
                    #[prost(string, repeated, tag = "3")]
                    pub resource_names: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
                    #[prost(string, tag = "4")]
                    pub type_url: ::prost::alloc::string::String,
                    #[prost(string, tag = "5")]
                    pub response_nonce: ::prost::alloc::string::String,
                    #[prost(message, optional, tag = "6")]
                    pub error_detail: ::core::option::Option<crate::google::rpc::Status>,
                }

                /// Discovery response sent by the control plane.
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct DiscoveryResponse {
                    #[prost(string, tag = "1")]
                    pub version_info: ::prost::alloc::string::String,
                    #[prost(message, repeated, tag = "2")]
                    pub resources: ::prost::alloc::vec::Vec<::prost_types::Any>,
                    #[prost(bool, tag = "3")]
                    pub canary: bool,
                    #[prost(string, tag = "4")]
                    pub type_url: ::prost::alloc::string::String,
                    #[prost(string, tag = "5")]
                    pub nonce: ::prost::alloc::string::String,
                    #[prost(message, optional, tag = "6")]
                    pub control_plane: ::core::option::Option<ControlPlane>,
                }
            }
        }
    }
}
