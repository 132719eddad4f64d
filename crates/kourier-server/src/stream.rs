//! Per-stream bookkeeping.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use kourier_core::{GatewayNode, NodeHash};

static NEXT_STREAM: AtomicU64 = AtomicU64::new(1);

/// Process-unique ADS stream number, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u64);

impl StreamId {
    /// Allocate the next stream number.
    pub fn new() -> Self {
        Self(NEXT_STREAM.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw number.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ads-{}", self.0)
    }
}

/// State of one gateway stream that outlives individual requests.
///
/// The gateway node is fixed by the first request that names one; later
/// requests cannot move the stream to another node.
#[derive(Debug)]
pub struct StreamContext {
    id: StreamId,
    node: Option<GatewayNode>,
    opened: Instant,
    requests: u64,
    responses: u64,
}

impl StreamContext {
    /// Context for a freshly opened stream.
    pub fn new() -> Self {
        Self {
            id: StreamId::new(),
            node: None,
            opened: Instant::now(),
            requests: 0,
            responses: 0,
        }
    }

    /// The stream number.
    #[inline]
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// The node the stream serves, once identified.
    pub fn node(&self) -> Option<&GatewayNode> {
        self.node.as_ref()
    }

    /// Cache key of the identified node.
    pub fn node_hash(&self) -> Option<NodeHash> {
        self.node.as_ref().map(GatewayNode::hash)
    }

    /// ID of the identified node.
    pub fn node_id(&self) -> Option<&str> {
        self.node.as_ref().map(GatewayNode::id)
    }

    /// Bind the stream to `node`. Only the first call has an effect.
    pub fn identify(&mut self, node: GatewayNode) -> NodeHash {
        self.node.get_or_insert(node).hash()
    }

    /// Time since the stream opened.
    pub fn duration(&self) -> Duration {
        self.opened.elapsed()
    }

    /// Count a received request.
    pub fn record_request(&mut self) {
        self.requests += 1;
    }

    /// Count a sent response.
    pub fn record_response(&mut self) {
        self.responses += 1;
    }

    /// Requests received so far.
    pub fn request_count(&self) -> u64 {
        self.requests
    }

    /// Responses sent so far.
    pub fn response_count(&self) -> u64 {
        self.responses
    }
}

impl Default for StreamContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_ids_increase() {
        let first = StreamId::new();
        let second = StreamId::new();
        assert!(second > first);
        assert!(first.to_string().starts_with("ads-"));
    }

    #[test]
    fn first_identification_wins() {
        let mut ctx = StreamContext::new();
        assert!(ctx.node().is_none());

        let gateway = GatewayNode::default();
        assert_eq!(ctx.identify(gateway.clone()), gateway.hash());
        assert_eq!(ctx.identify(GatewayNode::new("other")), gateway.hash());
        assert_eq!(ctx.node_id(), Some(GatewayNode::DEFAULT_ID));
    }

    #[test]
    fn counts_traffic() {
        let mut ctx = StreamContext::new();
        ctx.record_request();
        ctx.record_request();
        ctx.record_response();
        assert_eq!((ctx.request_count(), ctx.response_count()), (2, 1));
    }
}
