//! Type URL handling for discovery resources.
//!
//! The control plane serves exactly four resource types. [`ResourceType`]
//! enumerates them in the order updates must be pushed to a proxy so that
//! nothing references a resource the proxy has not received yet.

use std::fmt;

use crate::KourierError;

/// Type URL constants for the served resource types.
///
/// # Example
///
/// ```rust
/// use kourier_core::TypeUrl;
///
/// assert_eq!(TypeUrl::short_name(TypeUrl::CLUSTER), "Cluster");
/// ```
#[derive(Clone, Copy, Debug)]
pub struct TypeUrl;

impl TypeUrl {
    /// Type URL for Cluster (CDS).
    pub const CLUSTER: &'static str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";

    /// Type URL for ClusterLoadAssignment (EDS).
    pub const ENDPOINT: &'static str =
        "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";

    /// Type URL for Listener (LDS).
    pub const LISTENER: &'static str = "type.googleapis.com/envoy.config.listener.v3.Listener";

    /// Type URL for RouteConfiguration (RDS).
    pub const ROUTE: &'static str =
        "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";

    /// Type URL for the HTTP connection manager network filter config.
    pub const HTTP_CONNECTION_MANAGER: &'static str =
        "type.googleapis.com/envoy.extensions.filters.network.http_connection_manager.v3.HttpConnectionManager";

    /// Type URL for the router HTTP filter config.
    pub const ROUTER: &'static str =
        "type.googleapis.com/envoy.extensions.filters.http.router.v3.Router";

    /// Extract the short name from a type URL.
    ///
    /// For example, `type.googleapis.com/envoy.config.cluster.v3.Cluster`
    /// returns `Cluster`.
    #[must_use]
    pub fn short_name(type_url: &str) -> &str {
        type_url
            .rsplit('/')
            .next()
            .and_then(|s| s.rsplit('.').next())
            .unwrap_or(type_url)
    }
}

/// The resource types carried by a snapshot.
///
/// Variants are declared in push order: clusters, load assignments,
/// listeners, route tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    /// Upstream clusters (CDS).
    Cluster,
    /// Endpoints of a cluster (EDS).
    Endpoint,
    /// Listeners (LDS).
    Listener,
    /// Route tables (RDS).
    Route,
}

impl ResourceType {
    /// All resource types in push order.
    pub const ALL: [ResourceType; 4] = [
        ResourceType::Cluster,
        ResourceType::Endpoint,
        ResourceType::Listener,
        ResourceType::Route,
    ];

    /// The type URL of this resource type.
    #[must_use]
    pub const fn type_url(&self) -> &'static str {
        match self {
            Self::Cluster => TypeUrl::CLUSTER,
            Self::Endpoint => TypeUrl::ENDPOINT,
            Self::Listener => TypeUrl::LISTENER,
            Self::Route => TypeUrl::ROUTE,
        }
    }

    /// The short message name, e.g. `ClusterLoadAssignment`.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        TypeUrl::short_name(self.type_url())
    }

    /// Resolve a type URL received from a proxy.
    pub fn from_type_url(type_url: &str) -> crate::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.type_url() == type_url)
            .ok_or_else(|| KourierError::InvalidTypeUrl {
                type_url: type_url.to_string(),
                reason: if type_url.starts_with("type.googleapis.com/") {
                    "resource type is not served".to_string()
                } else {
                    "missing type.googleapis.com/ prefix".to_string()
                },
            })
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_url())
    }
}
