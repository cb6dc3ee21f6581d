//! Subscription multiplexing
//!
//! Lets one connection carry many independent server streams, each addressed
//! by a client-chosen id.
//!
//! # Architecture
//!
//! ```text
//!   inbound frame
//!        │
//!        ▼
//!   PushMessageHandler ──subscribe──► InvocationGateway ──► ItemStream
//!        │                                                     │
//!        │ unsubscribe                                         ▼
//!        ▼                                               StreamBridge (task)
//!   SubscriptionRegistry ◄──── remove_if_current ──────────────┤
//!        │                                                     │
//!        └── CloseHandle::close ──► cancels ──────────────────►│
//!                                                              ▼
//!                                                        OutboundSink
//! ```
//!
//! # Termination
//!
//! A subscription ends on the first of: stream completion, stream failure,
//! client unsubscribe, connection teardown. Each trigger has to win a
//! removal from the registry before it may act, so exactly one of them
//! produces the terminal effect (`complete`, `error`, or silence).

pub mod bridge;
pub mod error;
pub mod handler;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;

pub use bridge::{BridgeOutcome, StreamBridge};
pub use error::{PushError, NO_SUCH_ENDPOINT_MESSAGE, STREAM_FAILURE_MESSAGE};
pub use handler::PushMessageHandler;
pub use sink::{sink_fn, FnSink, OutboundSink, Sender};
