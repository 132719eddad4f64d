//! Gateway proxy bootstrap.
//!
//! The bootstrap gives the proxy its node identity, an admin listener and a
//! single static cluster pointing at the discovery server. Everything else
//! (listeners, routes, clusters, endpoints) arrives over the aggregated
//! stream.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use kourier_core::{GatewayNode, KourierError, Result};
use serde_json::{json, Value};
use tracing::debug;

/// Name of the static cluster the proxy reaches the discovery server with.
pub const XDS_CLUSTER: &str = "xds_cluster";

/// Inputs of the generated bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Node ID the proxy presents; must match the cache key.
    pub node_id: String,
    /// Node cluster the proxy presents.
    pub node_cluster: String,
    /// Address the proxy dials for discovery.
    pub management_address: SocketAddr,
    /// Port of the admin listener, bound on localhost.
    pub admin_port: u16,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            node_id: GatewayNode::DEFAULT_ID.to_string(),
            node_cluster: "kourier-gateway".to_string(),
            management_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 18000),
            admin_port: 9901,
        }
    }
}

impl BootstrapConfig {
    /// Render the bootstrap document.
    ///
    /// # Example
    ///
    /// ```rust
    /// use kourier::bootstrap::BootstrapConfig;
    ///
    /// let bootstrap = BootstrapConfig::default().render();
    /// assert_eq!(bootstrap["node"]["id"], "3scale-kourier-gateway");
    /// ```
    pub fn render(&self) -> Value {
        let ads = json!({ "ads": {}, "resource_api_version": "V3" });
        json!({
            "node": {
                "id": self.node_id,
                "cluster": self.node_cluster,
            },
            "admin": {
                "address": socket_address("127.0.0.1", self.admin_port),
            },
            "dynamic_resources": {
                "ads_config": {
                    "api_type": "GRPC",
                    "transport_api_version": "V3",
                    "grpc_services": [{ "envoy_grpc": { "cluster_name": XDS_CLUSTER } }],
                },
                "cds_config": ads,
                "lds_config": ads,
            },
            "static_resources": {
                "clusters": [{
                    "name": XDS_CLUSTER,
                    "type": "STRICT_DNS",
                    "connect_timeout": "1s",
                    "typed_extension_protocol_options": {
                        "envoy.extensions.upstreams.http.v3.HttpProtocolOptions": {
                            "@type": "type.googleapis.com/envoy.extensions.upstreams.http.v3.HttpProtocolOptions",
                            "explicit_http_config": { "http2_protocol_options": {} },
                        },
                    },
                    "load_assignment": {
                        "cluster_name": XDS_CLUSTER,
                        "endpoints": [{
                            "lb_endpoints": [{
                                "endpoint": {
                                    "address": socket_address(
                                        &self.management_address.ip().to_string(),
                                        self.management_address.port(),
                                    ),
                                },
                            }],
                        }],
                    },
                }],
            },
        })
    }

    /// Write the rendered bootstrap to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`KourierError::Gateway`] if the file cannot be written.
    pub async fn write_to(&self, path: &Path) -> Result<()> {
        let document = serde_json::to_vec_pretty(&self.render())
            .map_err(|e| KourierError::gateway("cannot render bootstrap", e))?;
        tokio::fs::write(path, document).await.map_err(|e| {
            KourierError::gateway(format!("cannot write bootstrap to {}", path.display()), e)
        })?;
        debug!(path = %path.display(), node_id = %self.node_id, "wrote gateway bootstrap");
        Ok(())
    }
}

fn socket_address(address: &str, port: u16) -> Value {
    json!({ "socket_address": { "address": address, "port_value": port } })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_uses_aggregated_discovery() {
        let doc = BootstrapConfig::default().render();
        assert_eq!(doc["dynamic_resources"]["ads_config"]["api_type"], "GRPC");
        assert_eq!(
            doc["dynamic_resources"]["ads_config"]["grpc_services"][0]["envoy_grpc"]["cluster_name"],
            XDS_CLUSTER
        );
        assert!(doc["dynamic_resources"]["lds_config"]["ads"].is_object());
        assert!(doc["dynamic_resources"]["cds_config"]["ads"].is_object());
    }

    #[test]
    fn bootstrap_points_at_management_listener() {
        let config = BootstrapConfig {
            node_id: "edge".to_string(),
            management_address: "10.0.0.5:18001".parse().unwrap(),
            admin_port: 9000,
            ..Default::default()
        };
        let doc = config.render();

        let endpoint = &doc["static_resources"]["clusters"][0]["load_assignment"]["endpoints"][0]
            ["lb_endpoints"][0]["endpoint"]["address"]["socket_address"];
        assert_eq!(endpoint["address"], "10.0.0.5");
        assert_eq!(endpoint["port_value"], 18001);
        assert_eq!(doc["node"]["id"], "edge");
        assert_eq!(doc["admin"]["address"]["socket_address"]["port_value"], 9000);
    }

    #[tokio::test]
    async fn write_to_produces_parseable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bootstrap.json");
        BootstrapConfig::default().write_to(&path).await.unwrap();

        let written: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, BootstrapConfig::default().render());
    }

    #[tokio::test]
    async fn write_to_missing_directory_fails() {
        let err = BootstrapConfig::default()
            .write_to(Path::new("/nonexistent/kourier/bootstrap.json"))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
