//! Push protocol messages
//!
//! Messages are JSON objects discriminated by an `@type` tag:
//!
//! ```text
//! client -> server   {"@type":"subscribe","id":"1","endpointName":"Counter","methodName":"tick","params":[]}
//!                    {"@type":"unsubscribe","id":"1"}
//! server -> client   {"@type":"update","id":"1","item":0}
//!                    {"@type":"complete","id":"1"}
//!                    {"@type":"error","id":"1","message":"No such endpoint"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// Name of the discriminator field
pub const TYPE_TAG: &str = "@type";

/// Inbound tag values this side understands
const SUBSCRIBE: &str = "subscribe";
const UNSUBSCRIBE: &str = "unsubscribe";

/// Request to start a stream under a client-chosen id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeMessage {
    pub id: String,
    pub endpoint_name: String,
    pub method_name: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

/// Request to stop the stream registered under `id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeMessage {
    pub id: String,
}

/// Message sent from the client to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type", rename_all = "lowercase")]
pub enum ServerMessage {
    Subscribe(SubscribeMessage),
    Unsubscribe(UnsubscribeMessage),
}

impl ServerMessage {
    /// Build a subscribe message
    pub fn subscribe(
        id: impl Into<String>,
        endpoint_name: impl Into<String>,
        method_name: impl Into<String>,
        params: Vec<Value>,
    ) -> Self {
        ServerMessage::Subscribe(SubscribeMessage {
            id: id.into(),
            endpoint_name: endpoint_name.into(),
            method_name: method_name.into(),
            params,
        })
    }

    /// Build an unsubscribe message
    pub fn unsubscribe(id: impl Into<String>) -> Self {
        ServerMessage::Unsubscribe(UnsubscribeMessage { id: id.into() })
    }

    /// Subscription id the message refers to
    pub fn id(&self) -> &str {
        match self {
            ServerMessage::Subscribe(m) => &m.id,
            ServerMessage::Unsubscribe(m) => &m.id,
        }
    }

    /// Decode a single JSON frame
    ///
    /// The tag is checked before the body so that a frame from a newer or
    /// foreign protocol is reported as `UnsupportedMessageKind` instead of a
    /// generic parse failure.
    pub fn from_json(frame: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(frame)?;

        let kind = value
            .get(TYPE_TAG)
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::Malformed(format!("missing {} tag", TYPE_TAG)))?;

        match kind {
            SUBSCRIBE | UNSUBSCRIBE => Ok(serde_json::from_value(value)?),
            other => Err(ProtocolError::UnsupportedMessageKind(other.to_string())),
        }
    }

    /// Encode as a JSON string
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Message sent from the server to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// A stream produced an item
    Update { id: String, item: Value },
    /// A stream finished normally
    Complete { id: String },
    /// A subscription failed or was rejected
    Error { id: String, message: String },
}

impl ClientMessage {
    pub fn update(id: impl Into<String>, item: Value) -> Self {
        ClientMessage::Update {
            id: id.into(),
            item,
        }
    }

    pub fn complete(id: impl Into<String>) -> Self {
        ClientMessage::Complete { id: id.into() }
    }

    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        ClientMessage::Error {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Subscription id the message belongs to
    pub fn id(&self) -> &str {
        match self {
            ClientMessage::Update { id, .. }
            | ClientMessage::Complete { id }
            | ClientMessage::Error { id, .. } => id,
        }
    }

    /// Whether this message ends the subscription on the client side
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ClientMessage::Update { .. })
    }

    /// Encode as a JSON string
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a single JSON frame
    pub fn from_json(frame: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(frame)?)
    }
}
