//! Gateway node identification.
//!
//! A gateway node is one data-plane proxy instance. It is addressed by the
//! node ID it presents in discovery requests; the cache is keyed by the
//! FNV-1a hash of that ID.

use std::fmt;
use std::hash::{Hash, Hasher};

use fnv::FnvHasher;

/// Hash-based node identifier for cache lookups.
///
/// # Example
///
/// ```rust
/// use kourier_core::NodeHash;
///
/// let a = NodeHash::from_id("gateway-a");
/// let b = NodeHash::from_id("gateway-b");
///
/// assert_ne!(a, b);
/// assert_eq!(a, NodeHash::from_id("gateway-a"));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHash(u64);

impl NodeHash {
    /// Create a node hash from a node ID string.
    #[must_use]
    pub fn from_id(node_id: &str) -> Self {
        let mut hasher = FnvHasher::default();
        node_id.hash(&mut hasher);
        Self(hasher.finish())
    }

    /// Get the raw hash value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A gateway node: the stable ID handed to the proxy plus its cache key.
///
/// The ID is static for the lifetime of the process. The proxy must be
/// started with exactly this ID or it will never receive configuration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GatewayNode {
    id: String,
    hash: NodeHash,
}

impl GatewayNode {
    /// Node ID used when none is configured.
    pub const DEFAULT_ID: &'static str = "3scale-kourier-gateway";

    /// Create a gateway node from its ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let hash = NodeHash::from_id(&id);
        Self { id, hash }
    }

    /// The node ID as presented by the proxy.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The cache key for this node.
    #[inline]
    #[must_use]
    pub fn hash(&self) -> NodeHash {
        self.hash
    }
}

impl Default for GatewayNode {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ID)
    }
}

impl fmt::Display for GatewayNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
