//! Invocation gateway contract
//!
//! The gateway resolves an endpoint method, authorizes the caller and starts
//! it. The multiplexer only consumes this contract; endpoint lookup and
//! access control live behind it.
//!
//! Implementations must return a *lazy* stream: nothing may be produced
//! until the stream is first polled. The multiplexer relies on this to
//! register a subscription before its first event can exist.

use futures::stream::BoxStream;
use serde_json::{Map, Value};

use crate::session::CallerContext;

/// Failure raised by a running stream
pub type StreamError = Box<dyn std::error::Error + Send + Sync>;

/// Items produced by an invoked stream method
pub type ItemStream = BoxStream<'static, Result<Value, StreamError>>;

/// Declared result shape of an endpoint method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    /// Method produces a stream of items
    Stream,
    /// Method produces a single value
    Value,
}

/// Everything the gateway needs for one call
#[derive(Debug)]
pub struct Invocation<'a> {
    pub endpoint: &'a str,
    pub method: &'a str,
    /// Parameters keyed by position (`"0"`, `"1"`, ...)
    pub params: Map<String, Value>,
    /// Caller snapshot taken when the subscription was requested
    pub caller: &'a CallerContext,
}

impl<'a> Invocation<'a> {
    /// Build an invocation from positional parameters
    pub fn new(
        endpoint: &'a str,
        method: &'a str,
        params: Vec<Value>,
        caller: &'a CallerContext,
    ) -> Self {
        Self {
            endpoint,
            method,
            params: keyed_params(params),
            caller,
        }
    }

    /// Parameter at a position
    pub fn param(&self, index: usize) -> Option<&Value> {
        self.params.get(&index.to_string())
    }
}

/// Convert positional parameters into the keyed form
pub fn keyed_params(params: Vec<Value>) -> Map<String, Value> {
    params
        .into_iter()
        .enumerate()
        .map(|(i, v)| (i.to_string(), v))
        .collect()
}

/// Classified synchronous invocation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    /// Endpoint or method does not exist
    NotFound(String),
    /// Caller may not invoke the method
    AccessDenied(String),
    /// Parameters could not be bound
    BadRequest(String),
    /// Method failed before returning a stream
    Internal(String),
}

impl std::fmt::Display for InvocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvocationError::NotFound(msg) => write!(f, "Endpoint not found: {}", msg),
            InvocationError::AccessDenied(msg)
            | InvocationError::BadRequest(msg)
            | InvocationError::Internal(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for InvocationError {}

/// Resolves and starts endpoint stream methods
pub trait InvocationGateway: Send + Sync + 'static {
    /// Declared result shape, or `None` if the method is unknown
    fn return_kind(&self, endpoint: &str, method: &str) -> Option<ReturnKind>;

    /// Invoke a stream method on behalf of `invocation.caller`
    fn invoke(&self, invocation: Invocation<'_>) -> Result<ItemStream, InvocationError>;
}

impl<G: InvocationGateway> InvocationGateway for std::sync::Arc<G> {
    fn return_kind(&self, endpoint: &str, method: &str) -> Option<ReturnKind> {
        (**self).return_kind(endpoint, method)
    }

    fn invoke(&self, invocation: Invocation<'_>) -> Result<ItemStream, InvocationError> {
        (**self).invoke(invocation)
    }
}
