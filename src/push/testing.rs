//! Stub gateway and helpers shared by the push and server tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::Poll;
use std::time::Duration;

use futures::{stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::gateway::{Invocation, InvocationError, InvocationGateway, ItemStream, ReturnKind, StreamError};
use crate::protocol::ClientMessage;
use crate::session::CallerContext;

/// Producer half of a [`StubMethod::Channel`] stream
pub type ProducerTx = mpsc::UnboundedSender<Result<Value, StreamError>>;

/// Behavior of one stub method
pub enum StubMethod {
    /// Emits the items, then completes
    Items(Vec<Value>),
    /// Emits the items, then fails with the message
    ItemsThenError(Vec<Value>, String),
    /// Never emits; sets the flag when the stream is dropped
    Pending(Arc<AtomicBool>),
    /// Emits 0, 1, 2, ... as fast as it is polled; sets the flag when dropped
    Endless(Arc<AtomicBool>),
    /// Emits whatever is pushed into the paired sender; completes when it is dropped
    Channel(Mutex<Option<mpsc::UnboundedReceiver<Result<Value, StreamError>>>>),
    /// Emits the caller's principal name once, then completes
    WhoAmI,
    /// Like `Items`, but only for callers in the role
    RequiresRole(String, Vec<Value>),
    /// Declared as returning a single value
    NotAStream,
    /// Invocation fails synchronously
    Fails(InvocationError),
    /// Blocks `invoke` for the delay, then returns a stream that never emits
    /// and records its first poll and its drop in the tracker
    Tracked(Arc<StreamTracker>, Duration),
}

/// What happened to the streams of a [`StubMethod::Tracked`] method
#[derive(Debug, Default)]
pub struct StreamTracker {
    /// Streams polled at least once
    pub polled: AtomicUsize,
    /// Streams dropped
    pub dropped: AtomicUsize,
}

struct TrackerGuard {
    tracker: Arc<StreamTracker>,
    polled: bool,
}

impl Drop for TrackerGuard {
    fn drop(&mut self) {
        self.tracker.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory gateway with a fixed method table
#[derive(Default)]
pub struct StubGateway {
    methods: HashMap<(String, String), StubMethod>,
    invocations: AtomicUsize,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, endpoint: &str, method: &str, behavior: StubMethod) -> Self {
        self.methods
            .insert((endpoint.to_string(), method.to_string()), behavior);
        self
    }

    /// Add a channel-driven method and return its producer
    pub fn channel(self, endpoint: &str, method: &str) -> (Self, ProducerTx) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            self.method(endpoint, method, StubMethod::Channel(Mutex::new(Some(rx)))),
            tx,
        )
    }

    /// Number of `invoke` calls so far
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn items(values: &[Value]) -> ItemStream {
    stream::iter(values.to_vec().into_iter().map(Ok)).boxed()
}

impl InvocationGateway for StubGateway {
    fn return_kind(&self, endpoint: &str, method: &str) -> Option<ReturnKind> {
        let behavior = self.methods.get(&(endpoint.to_string(), method.to_string()))?;
        match behavior {
            StubMethod::NotAStream => Some(ReturnKind::Value),
            _ => Some(ReturnKind::Stream),
        }
    }

    fn invoke(&self, invocation: Invocation<'_>) -> Result<ItemStream, InvocationError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);

        let key = (invocation.endpoint.to_string(), invocation.method.to_string());
        let behavior = self
            .methods
            .get(&key)
            .ok_or_else(|| InvocationError::NotFound(invocation.endpoint.to_string()))?;

        match behavior {
            StubMethod::Items(values) => Ok(items(values)),
            StubMethod::ItemsThenError(values, message) => {
                let failure: StreamError = message.clone().into();
                Ok(items(values).chain(stream::once(async move { Err(failure) })).boxed())
            }
            StubMethod::Pending(dropped) => {
                let flag = DropFlag(Arc::clone(dropped));
                Ok(stream::pending::<Result<Value, StreamError>>()
                    .map(move |item| {
                        let _ = &flag;
                        item
                    })
                    .boxed())
            }
            StubMethod::Endless(dropped) => {
                let flag = DropFlag(Arc::clone(dropped));
                Ok(stream::iter(0u64..)
                    .map(move |n| {
                        let _ = &flag;
                        Ok(Value::from(n))
                    })
                    .boxed())
            }
            StubMethod::Channel(slot) => {
                let rx = slot
                    .lock()
                    .unwrap()
                    .take()
                    .ok_or_else(|| InvocationError::Internal("channel already taken".into()))?;
                Ok(stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                })
                .boxed())
            }
            StubMethod::WhoAmI => {
                let caller = invocation.caller.clone();
                Ok(stream::once(async move {
                    let name = caller.principal().map(|p| p.name.clone());
                    Ok(Value::from(name.unwrap_or_else(|| "anonymous".to_string())))
                })
                .boxed())
            }
            StubMethod::RequiresRole(role, values) => {
                if invocation.caller.is_in_role(role) {
                    Ok(items(values))
                } else {
                    Err(InvocationError::AccessDenied("Access denied".into()))
                }
            }
            StubMethod::NotAStream => Err(InvocationError::Internal("not a stream".into())),
            StubMethod::Fails(err) => Err(err.clone()),
            StubMethod::Tracked(tracker, delay) => {
                std::thread::sleep(*delay);
                let mut guard = TrackerGuard {
                    tracker: Arc::clone(tracker),
                    polled: false,
                };
                Ok(stream::poll_fn(move |_cx| {
                    if !guard.polled {
                        guard.polled = true;
                        guard.tracker.polled.fetch_add(1, Ordering::SeqCst);
                    }
                    Poll::<Option<Result<Value, StreamError>>>::Pending
                })
                .boxed())
            }
        }
    }
}

/// Receive messages until a terminal one for `id` arrives
pub async fn collect_until_terminal(
    rx: &mut mpsc::UnboundedReceiver<ClientMessage>,
    id: &str,
) -> Vec<ClientMessage> {
    let mut out = Vec::new();
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for terminal message")
            .expect("sink closed");
        let done = message.id() == id && message.is_terminal();
        out.push(message);
        if done {
            return out;
        }
    }
}

/// Give spawned tasks a chance to run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

/// Wait until `flag` is set
pub async fn wait_for(flag: &AtomicBool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !flag.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for flag");
}
