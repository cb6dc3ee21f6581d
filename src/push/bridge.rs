//! Stream bridge
//!
//! One bridge task per subscription. It is the single consumer of the
//! invoked stream: it turns items into `update` messages and, on the
//! terminal event, releases its own registry slot before reporting
//! `complete` or `error`. If the slot was already released (the client
//! unsubscribed, or the connection is being torn down) the terminal
//! message is suppressed.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::gateway::{ItemStream, StreamError};
use crate::protocol::ClientMessage;
use crate::registry::{CloseHandle, SubscriptionRegistry};
use crate::stats::MultiplexerStats;

use super::error::PushError;
use super::sink::Sender;

/// Updates relayed before the bridge yields back to the scheduler
const UPDATES_PER_YIELD: usize = 32;

/// How a bridge task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// Stream ended and `complete` was sent
    Completed,
    /// Stream failed and `error` was sent
    Failed,
    /// Subscription was closed before the stream ended
    Cancelled,
    /// Stream ended but its slot was already released; nothing was sent
    Suppressed,
}

/// Consumer side of one subscription
pub struct StreamBridge {
    id: String,
    generation: u64,
    handle: CloseHandle,
    registry: Arc<SubscriptionRegistry>,
    stats: Arc<MultiplexerStats>,
    sink: Sender,
}

impl StreamBridge {
    /// Create a bridge for the registry entry `id`/`generation`
    pub fn new(
        id: String,
        generation: u64,
        handle: CloseHandle,
        registry: Arc<SubscriptionRegistry>,
        stats: Arc<MultiplexerStats>,
        sink: Sender,
    ) -> Self {
        Self {
            id,
            generation,
            handle,
            registry,
            stats,
            sink,
        }
    }

    /// Consume `stream` on a new task
    pub fn spawn(self, stream: ItemStream) -> JoinHandle<BridgeOutcome> {
        tokio::spawn(self.run(stream))
    }

    /// Consume `stream` until it ends or the subscription is closed
    ///
    /// The stream is dropped before this returns, which releases whatever
    /// the producer holds.
    pub async fn run(self, mut stream: ItemStream) -> BridgeOutcome {
        let token = self.handle.token().clone();
        let mut since_yield = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                next = stream.next() => Some(next),
            };

            match next {
                None => return self.on_cancelled(),
                Some(Some(Ok(item))) => {
                    let message = ClientMessage::update(self.id.as_str(), item);
                    let sink = &self.sink;
                    if !self.handle.emit_if_open(|| sink.send(message)) {
                        return self.on_cancelled();
                    }
                    self.stats.on_update();

                    // An always-ready stream must not starve the connection's router
                    since_yield += 1;
                    if since_yield == UPDATES_PER_YIELD {
                        since_yield = 0;
                        tokio::task::yield_now().await;
                    }
                }
                Some(Some(Err(e))) => {
                    drop(stream);
                    return self.on_error(e).await;
                }
                Some(None) => {
                    drop(stream);
                    return self.on_complete().await;
                }
            }
        }
    }

    fn on_cancelled(&self) -> BridgeOutcome {
        tracing::debug!(id = %self.id, generation = self.generation, "Subscription cancelled");
        BridgeOutcome::Cancelled
    }

    async fn on_complete(&self) -> BridgeOutcome {
        if self.release().await {
            self.sink.send(ClientMessage::complete(self.id.as_str()));
            self.stats.on_completed();
            tracing::debug!(id = %self.id, generation = self.generation, "Stream completed");
            BridgeOutcome::Completed
        } else {
            tracing::debug!(
                id = %self.id,
                generation = self.generation,
                "Stream completed after unsubscribe, not reported"
            );
            BridgeOutcome::Suppressed
        }
    }

    async fn on_error(&self, e: StreamError) -> BridgeOutcome {
        let err = PushError::ProducerRuntimeError(e.to_string());
        tracing::error!(
            id = %self.id,
            generation = self.generation,
            error = %err,
            "Exception in stream"
        );

        if self.release().await {
            self.sink.send(ClientMessage::error(self.id.as_str(), err.client_message()));
            self.stats.on_failed();
            BridgeOutcome::Failed
        } else {
            BridgeOutcome::Suppressed
        }
    }

    /// Release this bridge's registry slot; `false` if someone else already did
    async fn release(&self) -> bool {
        self.registry
            .remove_if_current(&self.id, self.generation)
            .await
            .is_some()
    }
}
