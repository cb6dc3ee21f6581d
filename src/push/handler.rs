//! Push message handler
//!
//! Entry point for inbound client messages on one connection. Subscribe
//! requests are resolved through the invocation gateway and handed to a
//! stream bridge; unsubscribe requests close the registered subscription.
//!
//! # Ordering
//!
//! A subscription is inserted into the registry *before* its bridge task is
//! spawned. Gateway streams are lazy, so no item, completion or error can be
//! observed for an id before its entry exists, and an unsubscribe that
//! arrives after `handle_message` returned always finds the entry (or finds
//! it already released by the stream's own termination).

use std::sync::Arc;

use crate::error::ProtocolError;
use crate::gateway::{Invocation, InvocationGateway, ReturnKind};
use crate::protocol::{ClientMessage, ServerMessage, SubscribeMessage, UnsubscribeMessage};
use crate::registry::{CloseHandle, RegistryConfig, SubscriptionRegistry};
use crate::session::CallerContext;
use crate::stats::{MultiplexerStats, StatsSnapshot};

use super::bridge::StreamBridge;
use super::error::PushError;
use super::sink::Sender;

/// Routes client messages to subscriptions of a single connection
///
/// Owns the connection's subscription registry. Safe to share between
/// tasks; every method takes `&self`.
pub struct PushMessageHandler<G: InvocationGateway> {
    gateway: Arc<G>,
    registry: Arc<SubscriptionRegistry>,
    stats: Arc<MultiplexerStats>,
}

impl<G: InvocationGateway> PushMessageHandler<G> {
    /// Create a handler with an unlimited registry
    pub fn new(gateway: Arc<G>) -> Self {
        Self::with_registry_config(gateway, RegistryConfig::default())
    }

    /// Create a handler with custom registry configuration
    pub fn with_registry_config(gateway: Arc<G>, config: RegistryConfig) -> Self {
        Self {
            gateway,
            registry: Arc::new(SubscriptionRegistry::with_config(config)),
            stats: Arc::new(MultiplexerStats::new()),
        }
    }

    /// Get a reference to the subscription registry
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Current counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Decode one JSON frame and handle it
    ///
    /// A frame that is not a known inbound message is a protocol violation;
    /// the error is returned to the transport, which should drop the
    /// connection.
    pub async fn handle_frame(
        &self,
        frame: &str,
        caller: &CallerContext,
        sink: &Sender,
    ) -> Result<(), ProtocolError> {
        let message = ServerMessage::from_json(frame)?;
        self.handle_message(message, caller, sink).await;
        Ok(())
    }

    /// Handle one message from the client
    ///
    /// `sink` receives every message produced for subscriptions started by
    /// this call, for as long as they live.
    pub async fn handle_message(&self, message: ServerMessage, caller: &CallerContext, sink: &Sender) {
        match message {
            ServerMessage::Subscribe(msg) => self.handle_subscribe(msg, caller, sink).await,
            ServerMessage::Unsubscribe(msg) => self.handle_unsubscribe(msg, sink).await,
        }
    }

    async fn handle_subscribe(&self, msg: SubscribeMessage, caller: &CallerContext, sink: &Sender) {
        let id = msg.id.clone();
        let endpoint = msg.endpoint_name.clone();
        let method = msg.method_name.clone();

        match self.subscribe(msg, caller, sink).await {
            Ok(generation) => {
                self.stats.on_subscribed();
                tracing::debug!(
                    id = %id,
                    endpoint = %endpoint,
                    method = %method,
                    generation = generation,
                    "Subscription started"
                );
            }
            Err(e) => {
                self.stats.on_rejected();
                tracing::debug!(
                    id = %id,
                    endpoint = %endpoint,
                    method = %method,
                    error = %e,
                    "Subscription rejected"
                );
                self.report(id, &e, sink);
            }
        }
    }

    /// Tell the client about `err` if it is a client-visible failure
    fn report(&self, id: String, err: &PushError, sink: &Sender) {
        if err.is_reported() {
            sink.send(ClientMessage::error(id, err.client_message()));
        } else {
            tracing::warn!(id = %id, error = %err, "Ignoring request");
        }
    }

    /// Start a subscription; returns the registry generation on success
    async fn subscribe(
        &self,
        msg: SubscribeMessage,
        caller: &CallerContext,
        sink: &Sender,
    ) -> Result<u64, PushError> {
        let SubscribeMessage {
            id,
            endpoint_name,
            method_name,
            params,
        } = msg;

        match self.gateway.return_kind(&endpoint_name, &method_name) {
            Some(ReturnKind::Stream) => {}
            Some(ReturnKind::Value) => {
                return Err(PushError::NotAStreamMethod {
                    endpoint: endpoint_name,
                    method: method_name,
                })
            }
            None => {
                return Err(PushError::EndpointNotFound {
                    endpoint: endpoint_name,
                    method: method_name,
                })
            }
        }

        self.registry.check_available(&id).await?;

        // Identity is fixed here; the stream sees this snapshot for its lifetime
        let caller = caller.clone();
        let invocation = Invocation::new(&endpoint_name, &method_name, params, &caller);
        let stream = self
            .gateway
            .invoke(invocation)
            .map_err(|e| PushError::from_invocation(&endpoint_name, &method_name, e))?;

        // Insert before the stream is first polled; on failure it is dropped unpolled
        let handle = CloseHandle::new();
        let registration = self.registry.insert(&id, handle.clone()).await?;

        StreamBridge::new(
            id,
            registration.generation,
            handle,
            Arc::clone(&self.registry),
            Arc::clone(&self.stats),
            Arc::clone(sink),
        )
        .spawn(stream);

        Ok(registration.generation)
    }

    async fn handle_unsubscribe(&self, msg: UnsubscribeMessage, sink: &Sender) {
        if let Err(e) = self.unsubscribe(&msg.id).await {
            self.report(msg.id, &e, sink);
        }
    }

    /// Close the subscription live under `id`
    ///
    /// Nothing is sent to the client. Unknown ids are an error for the
    /// caller to log, never for the client to see.
    pub async fn unsubscribe(&self, id: &str) -> Result<(), PushError> {
        let handle = self
            .registry
            .remove(id)
            .await
            .ok_or_else(|| PushError::UnknownUnsubscribeTarget(id.to_string()))?;

        handle.close();
        self.stats.on_cancelled();
        tracing::debug!(id = %id, "Subscription closed by client");
        Ok(())
    }

    /// Close every live subscription without notifying the client
    ///
    /// Called when the connection goes away. Returns the number closed.
    pub async fn close_all(&self) -> usize {
        let drained = self.registry.drain().await;
        let count = drained.len();

        for (id, handle) in drained {
            handle.close();
            self.stats.on_cancelled();
            tracing::trace!(id = %id, "Subscription closed on teardown");
        }

        if count > 0 {
            tracing::debug!(count = count, "Closed remaining subscriptions");
        }
        count
    }
}
