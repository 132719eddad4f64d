//! Domain objects supplied by the resource watcher.
//!
//! These are ephemeral views: every reconciliation pulls a fresh set and
//! rebuilds the proxy configuration from it.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identity of a namespaced object.
///
/// Ordering is `(namespace, name)`, which is also the order used to break
/// ties between conflicting rules.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Namespace of the object.
    pub namespace: String,
    /// Name of the object within its namespace.
    pub name: String,
}

impl ObjectKey {
    /// Create a key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A host/path matcher routed to one or more weighted backends.
///
/// # Example
///
/// ```rust
/// use kourier_controller::{BackendRef, RouteRule};
///
/// let rule = RouteRule::new("default", "hello", "foo.example.com", "/")
///     .with_backend(BackendRef::new("hello-v1", 90))
///     .with_backend(BackendRef::new("hello-v2", 10));
///
/// assert_eq!(rule.key().to_string(), "default/hello");
/// assert_eq!(rule.backends.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    /// Namespace of the rule.
    pub namespace: String,
    /// Name of the rule.
    pub name: String,
    /// Host the rule matches.
    pub host: String,
    /// Path prefix the rule matches.
    #[serde(default = "default_path")]
    pub path: String,
    /// Weighted backends receiving the matched traffic.
    #[serde(default)]
    pub backends: Vec<BackendRef>,
    /// Optional request timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

fn default_path() -> String {
    "/".to_string()
}

impl RouteRule {
    /// Create a rule without backends.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        host: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            host: host.into(),
            path: path.into(),
            backends: Vec::new(),
            timeout_ms: None,
        }
    }

    /// Add a weighted backend.
    #[must_use]
    pub fn with_backend(mut self, backend: BackendRef) -> Self {
        self.backends.push(backend);
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// The rule's identity.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    /// The request timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Resolve a backend reference to the backend's identity.
    ///
    /// References without a namespace point into the rule's namespace.
    pub fn backend_key(&self, backend: &BackendRef) -> ObjectKey {
        let namespace = backend.namespace.as_deref().unwrap_or(&self.namespace);
        ObjectKey::new(namespace, &backend.name)
    }
}

/// A weighted reference from a rule to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendRef {
    /// Namespace of the backend; the rule's namespace when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Name of the backend.
    pub name: String,
    /// Relative share of traffic.
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    100
}

impl BackendRef {
    /// Reference a backend in the rule's namespace.
    pub fn new(name: impl Into<String>, weight: u32) -> Self {
        Self {
            namespace: None,
            name: name.into(),
            weight,
        }
    }

    /// Reference a backend in another namespace.
    pub fn in_namespace(namespace: impl Into<String>, name: impl Into<String>, weight: u32) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
            weight,
        }
    }
}

/// A logical service and its resolved endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    /// Namespace of the backend.
    pub namespace: String,
    /// Name of the backend.
    pub name: String,
    /// Endpoint addresses with readiness.
    #[serde(default)]
    pub endpoints: Vec<EndpointAddress>,
}

impl Backend {
    /// Create a backend without endpoints.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            endpoints: Vec::new(),
        }
    }

    /// Add an endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: EndpointAddress) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// The backend's identity.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    /// Endpoints currently able to receive traffic.
    pub fn ready_endpoints(&self) -> impl Iterator<Item = &EndpointAddress> {
        self.endpoints.iter().filter(|e| e.ready)
    }
}

/// One `address:port` of a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointAddress {
    /// IP address literal.
    pub address: String,
    /// Port number.
    pub port: u32,
    /// Whether the endpoint passes its readiness checks.
    #[serde(default = "default_ready")]
    pub ready: bool,
}

fn default_ready() -> bool {
    true
}

impl EndpointAddress {
    /// A ready endpoint.
    pub fn ready(address: impl Into<String>, port: u32) -> Self {
        Self {
            address: address.into(),
            port,
            ready: true,
        }
    }

    /// An endpoint that is not ready.
    pub fn not_ready(address: impl Into<String>, port: u32) -> Self {
        Self {
            address: address.into(),
            port,
            ready: false,
        }
    }
}

/// The complete input of one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterState {
    /// Every routing rule.
    #[serde(default)]
    pub rules: Vec<RouteRule>,
    /// Every backend.
    #[serde(default)]
    pub backends: Vec<Backend>,
}
