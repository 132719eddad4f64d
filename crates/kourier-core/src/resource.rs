//! Resource trait for snapshot contents.
//!
//! Anything that can be published in a snapshot implements [`Resource`].
//! Protobuf messages are wrapped in [`ProtoResource`], which knows the
//! resource type and name and encodes the message into a `google.protobuf.Any`.

use std::fmt;
use std::sync::Arc;

use crate::{KourierError, ResourceType};

/// Trait for resources that can be stored in a snapshot.
///
/// # Example
///
/// ```rust
/// use kourier_core::{Resource, ResourceType};
///
/// #[derive(Debug)]
/// struct RawCluster {
///     name: String,
///     bytes: Vec<u8>,
/// }
///
/// impl Resource for RawCluster {
///     fn resource_type(&self) -> ResourceType {
///         ResourceType::Cluster
///     }
///
///     fn name(&self) -> &str {
///         &self.name
///     }
///
///     fn encode(&self) -> kourier_core::Result<prost_types::Any> {
///         Ok(prost_types::Any {
///             type_url: self.resource_type().type_url().to_string(),
///             value: self.bytes.clone(),
///         })
///     }
/// }
/// ```
pub trait Resource: Send + Sync + fmt::Debug {
    /// The resource type.
    fn resource_type(&self) -> ResourceType;

    /// The resource name. Names are unique per type within a snapshot.
    fn name(&self) -> &str;

    /// Encode the resource to a protobuf Any message.
    fn encode(&self) -> crate::Result<prost_types::Any>;
}

/// Shared, type-erased resource.
pub type BoxResource = Arc<dyn Resource>;

/// A protobuf message published under a name.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoResource<M> {
    resource_type: ResourceType,
    name: String,
    message: M,
}

impl<M> ProtoResource<M>
where
    M: prost::Message + fmt::Debug + Send + Sync + 'static,
{
    /// Wrap a message.
    #[must_use]
    pub fn new(resource_type: ResourceType, name: impl Into<String>, message: M) -> Self {
        Self {
            resource_type,
            name: name.into(),
            message,
        }
    }

    /// The wrapped message.
    #[must_use]
    pub fn message(&self) -> &M {
        &self.message
    }

    /// Consume and return the wrapped message.
    #[must_use]
    pub fn into_message(self) -> M {
        self.message
    }

    /// Erase the message type.
    #[must_use]
    pub fn boxed(self) -> BoxResource {
        Arc::new(self)
    }
}

impl<M> Resource for ProtoResource<M>
where
    M: prost::Message + fmt::Debug + Send + Sync + 'static,
{
    fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self) -> crate::Result<prost_types::Any> {
        let mut value = Vec::with_capacity(self.message.encoded_len());
        self.message
            .encode(&mut value)
            .map_err(|e| KourierError::Encoding {
                type_url: self.resource_type.type_url().to_string(),
                message: e.to_string(),
            })?;
        Ok(prost_types::Any {
            type_url: self.resource_type.type_url().to_string(),
            value,
        })
    }
}
