//! Outbound message sink

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::protocol::ClientMessage;

/// Destination for messages addressed to the client
///
/// Called concurrently from the router and from every stream bridge, so
/// implementations must be thread-safe. `send` must not block: stream
/// bridges call it while holding their subscription's emit gate.
pub trait OutboundSink: Send + Sync + 'static {
    fn send(&self, message: ClientMessage);
}

/// Shared sink handle
pub type Sender = Arc<dyn OutboundSink>;

impl OutboundSink for mpsc::UnboundedSender<ClientMessage> {
    fn send(&self, message: ClientMessage) {
        if let Err(e) = mpsc::UnboundedSender::send(self, message) {
            // Receiver is gone, the connection is shutting down
            tracing::trace!(id = %e.0.id(), "Dropping message for closed connection");
        }
    }
}

/// Sink backed by a closure
pub struct FnSink<F>(F);

impl<F> OutboundSink for FnSink<F>
where
    F: Fn(ClientMessage) + Send + Sync + 'static,
{
    fn send(&self, message: ClientMessage) {
        (self.0)(message)
    }
}

/// Wrap a closure as a shared sink
pub fn sink_fn<F>(f: F) -> Sender
where
    F: Fn(ClientMessage) + Send + Sync + 'static,
{
    Arc::new(FnSink(f))
}
