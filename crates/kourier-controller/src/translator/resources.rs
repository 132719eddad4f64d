//! Builders for the Envoy resources a snapshot is made of.

use std::time::Duration;

use kourier_core::{ProtoResource, ResourceType, TypeUrl};
use kourier_types::envoy::config::cluster::v3::{cluster, Cluster};
use kourier_types::envoy::config::core::v3::{
    address, config_source, socket_address, Address, AggregatedConfigSource, ApiVersion,
    ConfigSource, SocketAddress,
};
use kourier_types::envoy::config::endpoint::v3::{
    lb_endpoint, ClusterLoadAssignment, Endpoint, LbEndpoint, LocalityLbEndpoints,
};
use kourier_types::envoy::config::listener::v3::{filter, Filter, FilterChain, Listener};
use kourier_types::envoy::config::route::v3::{
    route, route_action, route_match, weighted_cluster, Route, RouteAction, RouteConfiguration,
    RouteMatch, VirtualHost, WeightedCluster,
};
use kourier_types::envoy::extensions::filters::http::router::v3::Router;
use kourier_types::envoy::extensions::filters::network::http_connection_manager::v3::{
    http_connection_manager, http_filter, HttpConnectionManager, HttpFilter, Rds,
};
use prost::Message;

/// Network filter name of the HTTP connection manager.
pub const HTTP_CONNECTION_MANAGER: &str = "envoy.filters.network.http_connection_manager";

/// HTTP filter name of the router.
pub const HTTP_ROUTER: &str = "envoy.filters.http.router";

/// Configuration source pointing back at the aggregated stream.
pub fn ads_config_source() -> ConfigSource {
    ConfigSource {
        config_source_specifier: Some(config_source::ConfigSourceSpecifier::Ads(
            AggregatedConfigSource {},
        )),
        initial_fetch_timeout: None,
        resource_api_version: ApiVersion::V3 as i32,
    }
}

/// A TCP socket address.
pub fn socket_address(ip: &str, port: u32) -> Address {
    Address {
        address: Some(address::Address::SocketAddress(SocketAddress {
            protocol: socket_address::Protocol::Tcp as i32,
            address: ip.to_string(),
            port_value: port,
        })),
    }
}

/// Convert to the protobuf duration.
pub fn proto_duration(duration: Duration) -> prost_types::Duration {
    prost_types::Duration {
        seconds: i64::try_from(duration.as_secs()).unwrap_or(i64::MAX),
        // always below one billion
        nanos: i32::try_from(duration.subsec_nanos()).unwrap_or(0),
    }
}

/// A cluster whose endpoints are delivered over the aggregated stream.
pub fn eds_cluster(name: &str, connect_timeout: Duration) -> ProtoResource<Cluster> {
    let cluster = Cluster {
        name: name.to_string(),
        r#type: cluster::DiscoveryType::Eds as i32,
        eds_cluster_config: Some(cluster::EdsClusterConfig {
            eds_config: Some(ads_config_source()),
            service_name: name.to_string(),
        }),
        connect_timeout: Some(proto_duration(connect_timeout)),
        lb_policy: cluster::LbPolicy::RoundRobin as i32,
    };
    ProtoResource::new(ResourceType::Cluster, name, cluster)
}

/// A load assignment for `cluster_name` listing `endpoints` in the given order.
pub fn load_assignment<'a, I>(cluster_name: &str, endpoints: I) -> ProtoResource<ClusterLoadAssignment>
where
    I: IntoIterator<Item = (&'a str, u32)>,
{
    let lb_endpoints: Vec<LbEndpoint> = endpoints
        .into_iter()
        .map(|(ip, port)| LbEndpoint {
            host_identifier: Some(lb_endpoint::HostIdentifier::Endpoint(Endpoint {
                address: Some(socket_address(ip, port)),
            })),
            health_status: 0,
        })
        .collect();

    let endpoints = if lb_endpoints.is_empty() {
        Vec::new()
    } else {
        vec![LocalityLbEndpoints { lb_endpoints }]
    };

    ProtoResource::new(
        ResourceType::Endpoint,
        cluster_name,
        ClusterLoadAssignment {
            cluster_name: cluster_name.to_string(),
            endpoints,
        },
    )
}

/// One prefix route entry.
pub fn prefix_route(
    name: &str,
    prefix: &str,
    splits: &[(String, u32)],
    timeout: Option<Duration>,
) -> Route {
    let cluster_specifier = match splits {
        [(cluster, _)] => route_action::ClusterSpecifier::Cluster(cluster.clone()),
        _ => route_action::ClusterSpecifier::WeightedClusters(WeightedCluster {
            clusters: splits
                .iter()
                .map(|(cluster, weight)| weighted_cluster::ClusterWeight {
                    name: cluster.clone(),
                    weight: Some(*weight),
                })
                .collect(),
        }),
    };

    Route {
        r#match: Some(RouteMatch {
            path_specifier: Some(route_match::PathSpecifier::Prefix(prefix.to_string())),
        }),
        action: Some(route::Action::Route(RouteAction {
            cluster_specifier: Some(cluster_specifier),
            timeout: timeout.map(proto_duration),
        })),
        name: name.to_string(),
    }
}

/// A virtual host answering for `host`, with and without the gateway port.
pub fn virtual_host(host: &str, port: u16, routes: Vec<Route>) -> VirtualHost {
    VirtualHost {
        name: host.to_string(),
        domains: vec![host.to_string(), format!("{host}:{port}")],
        routes,
    }
}

/// The route table served to the gateway listener.
pub fn route_configuration(
    name: &str,
    virtual_hosts: Vec<VirtualHost>,
) -> ProtoResource<RouteConfiguration> {
    ProtoResource::new(
        ResourceType::Route,
        name,
        RouteConfiguration {
            name: name.to_string(),
            virtual_hosts,
        },
    )
}

/// The gateway's HTTP listener, fetching its route table by name.
pub fn http_listener(
    name: &str,
    ip: &str,
    port: u16,
    route_config_name: &str,
    stat_prefix: &str,
) -> ProtoResource<Listener> {
    let router = prost_types::Any {
        type_url: TypeUrl::ROUTER.to_string(),
        value: Router {}.encode_to_vec(),
    };
    let manager = HttpConnectionManager {
        codec_type: http_connection_manager::CodecType::Auto as i32,
        stat_prefix: stat_prefix.to_string(),
        route_specifier: Some(http_connection_manager::RouteSpecifier::Rds(Rds {
            config_source: Some(ads_config_source()),
            route_config_name: route_config_name.to_string(),
        })),
        http_filters: vec![HttpFilter {
            name: HTTP_ROUTER.to_string(),
            config_type: Some(http_filter::ConfigType::TypedConfig(router)),
        }],
    };

    let listener = Listener {
        name: name.to_string(),
        address: Some(socket_address(ip, u32::from(port))),
        filter_chains: vec![FilterChain {
            filters: vec![Filter {
                name: HTTP_CONNECTION_MANAGER.to_string(),
                config_type: Some(filter::ConfigType::TypedConfig(prost_types::Any {
                    type_url: TypeUrl::HTTP_CONNECTION_MANAGER.to_string(),
                    value: manager.encode_to_vec(),
                })),
            }],
            name: String::new(),
        }],
    };
    ProtoResource::new(ResourceType::Listener, name, listener)
}
