//! Server-push subscription multiplexer
//!
//! Many independent, long-lived server streams share one client connection.
//! The client opens a subscription by naming an endpoint method and a
//! client-chosen id; the server relays each item, then a single terminal
//! `complete` or `error`, unless the client unsubscribes first.
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use push_mux::gateway::{Invocation, InvocationError, InvocationGateway, ItemStream, ReturnKind};
//! use push_mux::{PushServer, ServerConfig};
//!
//! struct Ticker;
//!
//! impl InvocationGateway for Ticker {
//!     fn return_kind(&self, endpoint: &str, method: &str) -> Option<ReturnKind> {
//!         (endpoint == "Clock" && method == "ticks").then_some(ReturnKind::Stream)
//!     }
//!
//!     fn invoke(&self, _invocation: Invocation<'_>) -> Result<ItemStream, InvocationError> {
//!         Ok(futures::stream::iter((0..3).map(|n| Ok(serde_json::Value::from(n)))).boxed())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> push_mux::Result<()> {
//!     PushServer::new(ServerConfig::default(), Ticker).run().await
//! }
//! ```

pub mod error;
pub mod gateway;
pub mod protocol;
pub mod push;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, ProtocolError, Result};
pub use gateway::{Invocation, InvocationError, InvocationGateway, ItemStream, ReturnKind};
pub use protocol::{ClientMessage, ServerMessage};
pub use push::{PushError, PushMessageHandler};
pub use registry::{RegistryConfig, SubscriptionRegistry};
pub use server::{PushServer, ServerConfig};
pub use session::{CallerContext, Principal};
