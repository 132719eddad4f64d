//! State-of-the-World (SotW) discovery protocol handler.
//!
//! Every response carries the complete resource list of one type. The
//! handler keeps, per stream and per resource type, what the client is
//! known to hold and which nonce it must answer:
//!
//! - A request with an empty or unknown nonce opens (or re-opens) a
//!   subscription; a response follows if the cache version differs from
//!   the version the client reports.
//! - A request answering the last nonce is an ACK, or a NACK when it
//!   carries `error_detail`. Neither triggers a resend of the same version;
//!   after a NACK the client keeps its last good configuration until a
//!   newer version is published.
//! - A request answering an older nonce is stale and ignored.
//! - Cache updates are pushed to every subscribed type whose version
//!   changed, clusters first, then load assignments, listeners and route
//!   tables.

use std::collections::BTreeMap;
use std::sync::Arc;

use kourier_cache::{Cache, Snapshot, SnapshotCache};
use kourier_core::{GatewayNode, KourierError, NodeHash, ResourceType, ResourceVersion, Result};
use kourier_types::envoy::config::core::v3::ControlPlane;
use kourier_types::envoy::service::discovery::v3::{DiscoveryRequest, DiscoveryResponse};
use tracing::{debug, info, trace, warn};

use crate::metrics::DiscoveryMetrics;
use crate::stream::StreamContext;
use crate::utils::generate_nonce;

/// Per-type subscription state of one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subscription {
    /// Requested names; empty means every resource of the type.
    resource_names: Vec<String>,
    /// Version the client holds or was last sent.
    known_version: ResourceVersion,
    /// Highest version sent on this stream.
    sent_version: ResourceVersion,
    /// Version the client last acknowledged.
    acked_version: ResourceVersion,
    /// Nonce of the last response, which the next ACK/NACK must carry.
    last_nonce: Option<String>,
}

impl Subscription {
    /// Requested resource names.
    #[inline]
    pub fn resource_names(&self) -> &[String] {
        &self.resource_names
    }

    /// Version last acknowledged by the client.
    #[inline]
    pub fn acked_version(&self) -> ResourceVersion {
        self.acked_version
    }

    /// Highest version sent on this stream.
    #[inline]
    pub fn sent_version(&self) -> ResourceVersion {
        self.sent_version
    }

    /// Nonce of the last response.
    #[inline]
    pub fn last_nonce(&self) -> Option<&str> {
        self.last_nonce.as_deref()
    }

    /// Whether `current` should be sent: it differs from what the client
    /// holds and never moves the stream backwards.
    fn wants(&self, current: ResourceVersion) -> bool {
        !current.is_empty() && current != self.known_version && current > self.sent_version
    }
}

/// Subscriptions of one stream, keyed by resource type.
#[derive(Debug, Default)]
pub struct StreamState {
    subscriptions: BTreeMap<ResourceType, Subscription>,
}

impl StreamState {
    /// Create an empty stream state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The subscription for a resource type, if the client opened one.
    pub fn subscription(&self, resource_type: ResourceType) -> Option<&Subscription> {
        self.subscriptions.get(&resource_type)
    }

    /// Number of subscribed resource types.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether no resource type is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

/// Handler for State-of-the-World discovery requests.
#[derive(Debug)]
pub struct SotwHandler {
    cache: Arc<SnapshotCache>,
    metrics: DiscoveryMetrics,
    control_plane: ControlPlane,
}

impl SotwHandler {
    /// Create a new SotW handler.
    pub fn new(
        cache: Arc<SnapshotCache>,
        metrics: DiscoveryMetrics,
        control_plane_id: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            metrics,
            control_plane: ControlPlane {
                identifier: control_plane_id.into(),
            },
        }
    }

    /// Get a reference to the cache.
    #[inline]
    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Process one request of a stream.
    ///
    /// Returns the response to send, if any. Errors describe protocol
    /// violations; the caller logs them and keeps the stream open.
    pub fn handle_request(
        &self,
        ctx: &mut StreamContext,
        state: &mut StreamState,
        request: &DiscoveryRequest,
    ) -> Result<Option<DiscoveryResponse>> {
        ctx.record_request();
        self.metrics.record_request(&request.type_url);

        let node = self.identify(ctx, request)?;
        let resource_type = ResourceType::from_type_url(&request.type_url)?;

        trace!(
            stream = %ctx.id(),
            type_url = %request.type_url,
            version = %request.version_info,
            nonce = %request.response_nonce,
            resources = ?request.resource_names,
            "processing SotW request"
        );

        let subscription = state.subscriptions.entry(resource_type).or_default();
        let answers_last = !request.response_nonce.is_empty()
            && subscription.last_nonce.as_deref() == Some(request.response_nonce.as_str());

        if !request.response_nonce.is_empty() && subscription.last_nonce.is_some() && !answers_last
        {
            trace!(
                stream = %ctx.id(),
                type_url = %resource_type,
                nonce = %request.response_nonce,
                "ignoring request with stale nonce"
            );
            return Ok(None);
        }

        let mut force = false;
        if answers_last {
            if let Some(error) = &request.error_detail {
                self.metrics.record_nack(resource_type.type_url());
                let nack = KourierError::NackReceived {
                    node_id: ctx.node_id().unwrap_or_default().to_string(),
                    type_url: resource_type.type_url().to_string(),
                    nonce: request.response_nonce.clone(),
                    error_message: error.message.clone(),
                };
                warn!(
                    stream = %ctx.id(),
                    node = %node,
                    type_url = %resource_type,
                    rejected = %subscription.sent_version,
                    kept = %request.version_info,
                    code = error.code,
                    "{}",
                    nack
                );
                subscription.resource_names = request.resource_names.clone();
                return Ok(None);
            }

            self.metrics.record_ack(resource_type.type_url());
            subscription.acked_version =
                ResourceVersion::parse(&request.version_info).unwrap_or_default();
            debug!(
                stream = %ctx.id(),
                type_url = %resource_type,
                version = %subscription.acked_version,
                nonce = %request.response_nonce,
                "received ACK"
            );
            if subscription.resource_names == request.resource_names {
                return Ok(None);
            }
            // The subscribed names changed; answer with the current list.
            subscription.resource_names = request.resource_names.clone();
            force = true;
        } else {
            // First request for this type, or a re-request after reconnect.
            let reported = ResourceVersion::parse(&request.version_info).unwrap_or_default();
            subscription.resource_names = request.resource_names.clone();
            subscription.known_version = reported;
            subscription.acked_version = reported;
        }

        let Some(snapshot) = self.cache.get_snapshot(node) else {
            debug!(stream = %ctx.id(), node = %node, "no snapshot available for node");
            return Ok(None);
        };

        let current = snapshot.get_version(resource_type);
        let send = if force {
            !current.is_empty() && current >= subscription.sent_version
        } else {
            subscription.wants(current)
        };
        if !send {
            trace!(
                stream = %ctx.id(),
                type_url = %resource_type,
                version = %current,
                "client already has latest version"
            );
            return Ok(None);
        }

        Ok(Some(self.respond(ctx, subscription, resource_type, &snapshot)))
    }

    /// Responses for a newly published snapshot, in push order.
    pub fn handle_update(
        &self,
        ctx: &mut StreamContext,
        state: &mut StreamState,
        snapshot: &Snapshot,
    ) -> Vec<DiscoveryResponse> {
        let mut responses = Vec::new();
        for resource_type in ResourceType::ALL {
            let Some(subscription) = state.subscriptions.get_mut(&resource_type) else {
                continue;
            };
            if subscription.wants(snapshot.get_version(resource_type)) {
                responses.push(self.respond(ctx, subscription, resource_type, snapshot));
            }
        }
        responses
    }

    /// Resolve the stream's node, remembering it from the first request.
    fn identify(&self, ctx: &mut StreamContext, request: &DiscoveryRequest) -> Result<NodeHash> {
        if let Some(hash) = ctx.node_hash() {
            return Ok(hash);
        }
        match request.node.as_ref().filter(|node| !node.id.is_empty()) {
            Some(node) => {
                let hash = ctx.identify(GatewayNode::new(node.id.clone()));
                debug!(stream = %ctx.id(), node_id = %node.id, node = %hash, "node identified");
                Ok(hash)
            }
            None => Err(KourierError::StreamProtocol {
                message: "first request carries no node identifier".to_string(),
            }),
        }
    }

    fn respond(
        &self,
        ctx: &mut StreamContext,
        subscription: &mut Subscription,
        resource_type: ResourceType,
        snapshot: &Snapshot,
    ) -> DiscoveryResponse {
        let resources = snapshot.resources(resource_type);
        let version = resources.version();
        let nonce = generate_nonce();

        subscription.known_version = version;
        subscription.sent_version = version;
        subscription.last_nonce = Some(nonce.clone());

        let response = DiscoveryResponse {
            version_info: version.to_string(),
            resources: resources.select(&subscription.resource_names),
            canary: false,
            type_url: resource_type.type_url().to_string(),
            nonce,
            control_plane: Some(self.control_plane.clone()),
        };

        ctx.record_response();
        self.metrics
            .record_response(&response.type_url, response.resources.len());
        info!(
            stream = %ctx.id(),
            type_url = %resource_type,
            version = %response.version_info,
            nonce = %response.nonce,
            count = response.resources.len(),
            "sending SotW response"
        );

        response
    }
}
