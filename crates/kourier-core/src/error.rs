//! Error types for kourier operations.
//!
//! [`KourierError`] covers every failure mode of the control plane. The
//! variants follow the four failure classes the process distinguishes:
//!
//! | Class | Variants | Handling |
//! |-------|----------|----------|
//! | transient input | [`TransientInput`](KourierError::TransientInput) | retried by the scheduler |
//! | translation | [`Translation`](KourierError::Translation) | retried, previous snapshot stays |
//! | stream protocol | [`StreamProtocol`](KourierError::StreamProtocol), [`NackReceived`](KourierError::NackReceived) | logged, stream stays open |
//! | fatal startup | [`Bind`](KourierError::Bind), [`Gateway`](KourierError::Gateway), [`GatewayExited`](KourierError::GatewayExited) | process exits; dropped without retry by the scheduler |

/// Error type for kourier operations.
///
/// Converts to [`tonic::Status`] for gRPC responses. Components report
/// failures upward; only the reconciliation scheduler decides whether a
/// failure is retried.
///
/// # Example
///
/// ```rust
/// use kourier_core::KourierError;
///
/// fn validate_host(host: &str) -> Result<(), KourierError> {
///     if host.is_empty() {
///         return Err(KourierError::Translation {
///             object: "default/my-rule".to_string(),
///             reason: "host must not be empty".to_string(),
///         });
///     }
///     Ok(())
/// }
///
/// assert!(validate_host("").is_err());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum KourierError {
    /// The resource watcher could not supply the current state.
    #[error("resource watcher unavailable: {message}")]
    TransientInput {
        /// Description of what could not be read.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A routing rule or backend could not be translated.
    #[error("translation of {object} failed: {reason}")]
    Translation {
        /// `namespace/name` of the offending rule or backend.
        object: String,
        /// Reason for the failure.
        reason: String,
    },

    /// Malformed or unknown type URL.
    #[error("invalid type URL: {type_url} - {reason}")]
    InvalidTypeUrl {
        /// The invalid type URL.
        type_url: String,
        /// Reason why the type URL is invalid.
        reason: String,
    },

    /// Resource validation failed.
    #[error("invalid resource {type_url}/{name}: {reason}")]
    InvalidResource {
        /// The type URL of the resource.
        type_url: String,
        /// The name of the resource.
        name: String,
        /// Reason for validation failure.
        reason: String,
    },

    /// Protobuf encoding failed.
    #[error("encoding error for {type_url}: {message}")]
    Encoding {
        /// The type URL being encoded.
        type_url: String,
        /// Error message.
        message: String,
    },

    /// A discovery request violated the protocol.
    #[error("stream protocol error: {message}")]
    StreamProtocol {
        /// Description of the violation.
        message: String,
    },

    /// Client rejected configuration (NACK).
    #[error("NACK received from {node_id} for {type_url}: {error_message}")]
    NackReceived {
        /// The node ID that sent the NACK.
        node_id: String,
        /// The type URL that was rejected.
        type_url: String,
        /// The nonce of the rejected response.
        nonce: String,
        /// Error message from the client.
        error_message: String,
    },

    /// A listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The gateway process could not be started or prepared.
    #[error("gateway error: {message}")]
    Gateway {
        /// Description of the failure.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The gateway process exited.
    #[error("gateway process exited: {status}")]
    GatewayExited {
        /// Exit status as reported by the OS.
        status: String,
    },

    /// gRPC transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The process is shutting down.
    #[error("shutting down")]
    Shutdown,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unexpected internal error.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl KourierError {
    /// Create a transient input error from any error type.
    pub fn transient<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::TransientInput {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a translation error for the object `namespace/name`.
    pub fn translation(object: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Translation {
            object: object.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error from any error type.
    pub fn internal<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a transport error from any error type.
    pub fn transport<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a gateway error from any error type.
    pub fn gateway<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Gateway {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this error must terminate the process.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Bind { .. } | Self::Gateway { .. } | Self::GatewayExited { .. }
        )
    }
}

/// Convert to tonic::Status for gRPC responses.
impl From<KourierError> for tonic::Status {
    fn from(err: KourierError) -> Self {
        match &err {
            KourierError::InvalidTypeUrl { .. }
            | KourierError::InvalidResource { .. }
            | KourierError::StreamProtocol { .. }
            | KourierError::Configuration(_) => tonic::Status::invalid_argument(err.to_string()),
            KourierError::Translation { .. } => tonic::Status::failed_precondition(err.to_string()),
            KourierError::TransientInput { .. }
            | KourierError::Transport { .. }
            | KourierError::Shutdown => tonic::Status::unavailable(err.to_string()),
            // NACKs are informational for the server
            KourierError::NackReceived { .. } => tonic::Status::ok(err.to_string()),
            KourierError::Encoding { .. }
            | KourierError::Bind { .. }
            | KourierError::Gateway { .. }
            | KourierError::GatewayExited { .. }
            | KourierError::Internal { .. } => tonic::Status::internal(err.to_string()),
        }
    }
}
