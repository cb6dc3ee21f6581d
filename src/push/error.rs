//! Push error taxonomy
//!
//! Every way a subscription can fail or be refused, and the text the client
//! gets for it. Client text never includes producer internals. Inbound
//! messages of an unknown kind are not listed here: they end the connection
//! and surface as [`ProtocolError::UnsupportedMessageKind`].
//!
//! [`ProtocolError::UnsupportedMessageKind`]: crate::error::ProtocolError::UnsupportedMessageKind

use crate::gateway::InvocationError;
use crate::registry::RegistryError;

/// Message sent when a running stream fails
pub const STREAM_FAILURE_MESSAGE: &str = "Error in stream";

/// Message sent when the endpoint or method does not exist
pub const NO_SUCH_ENDPOINT_MESSAGE: &str = "No such endpoint";

/// Error type for subscription handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    /// Targeted method does not produce a stream
    NotAStreamMethod { endpoint: String, method: String },
    /// Endpoint or method does not exist
    EndpointNotFound { endpoint: String, method: String },
    /// Gateway refused the caller
    AccessDenied(String),
    /// Gateway could not bind the parameters
    BadRequest(String),
    /// Method failed before returning a stream
    InternalInvocationError(String),
    /// Running stream failed; holds the internal detail for logging
    ProducerRuntimeError(String),
    /// Unsubscribe for an id with no live subscription
    UnknownUnsubscribeTarget(String),
    /// Subscribe reused an id that is still live
    SubscriptionIdInUse(String),
    /// Connection already holds the maximum number of subscriptions
    SubscriptionLimitReached { limit: usize },
}

impl PushError {
    /// Map a gateway failure for `endpoint`/`method`
    pub fn from_invocation(endpoint: &str, method: &str, err: InvocationError) -> Self {
        match err {
            InvocationError::NotFound(_) => PushError::EndpointNotFound {
                endpoint: endpoint.to_string(),
                method: method.to_string(),
            },
            InvocationError::AccessDenied(msg) => PushError::AccessDenied(msg),
            InvocationError::BadRequest(msg) => PushError::BadRequest(msg),
            InvocationError::Internal(msg) => PushError::InternalInvocationError(msg),
        }
    }

    /// Whether the client is told about this error
    pub fn is_reported(&self) -> bool {
        !matches!(self, PushError::UnknownUnsubscribeTarget(_))
    }

    /// Text for the client-facing `error` message
    pub fn client_message(&self) -> String {
        match self {
            PushError::NotAStreamMethod { endpoint, method } => {
                format!("Method {}/{} is not a stream method", endpoint, method)
            }
            PushError::EndpointNotFound { .. } => NO_SUCH_ENDPOINT_MESSAGE.to_string(),
            PushError::AccessDenied(msg)
            | PushError::BadRequest(msg)
            | PushError::InternalInvocationError(msg) => msg.clone(),
            PushError::ProducerRuntimeError(_) => STREAM_FAILURE_MESSAGE.to_string(),
            PushError::SubscriptionIdInUse(id) => {
                format!("Subscription id {} is already active", id)
            }
            PushError::SubscriptionLimitReached { .. } => {
                "Too many active subscriptions".to_string()
            }
            PushError::UnknownUnsubscribeTarget(_) => self.to_string(),
        }
    }
}

impl std::fmt::Display for PushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushError::NotAStreamMethod { endpoint, method } => {
                write!(f, "Method {}/{} is not a stream method", endpoint, method)
            }
            PushError::EndpointNotFound { endpoint, method } => {
                write!(f, "No such endpoint: {}/{}", endpoint, method)
            }
            PushError::AccessDenied(msg) => write!(f, "Access denied: {}", msg),
            PushError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            PushError::InternalInvocationError(msg) => write!(f, "Invocation failed: {}", msg),
            PushError::ProducerRuntimeError(msg) => write!(f, "Stream failed: {}", msg),
            PushError::UnknownUnsubscribeTarget(id) => {
                write!(f, "Trying to close an unknown subscription with id {}", id)
            }
            PushError::SubscriptionIdInUse(id) => write!(f, "Subscription id already active: {}", id),
            PushError::SubscriptionLimitReached { limit } => {
                write!(f, "Subscription limit of {} reached", limit)
            }
        }
    }
}

impl std::error::Error for PushError {}

impl From<RegistryError> for PushError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::IdInUse(id) => PushError::SubscriptionIdInUse(id),
            RegistryError::LimitReached { limit } => PushError::SubscriptionLimitReached { limit },
        }
    }
}
