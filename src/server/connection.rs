//! Per-connection driver
//!
//! Reads newline-delimited JSON frames from the peer and feeds them to the
//! connection's own [`PushMessageHandler`]. Outbound messages go through an
//! unbounded channel to a writer task, so stream bridges never wait on the
//! socket.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::gateway::InvocationGateway;
use crate::protocol::{ClientMessage, FrameDecoder, FrameEncoder};
use crate::push::{PushMessageHandler, Sender};
use crate::registry::RegistryConfig;
use crate::server::config::ServerConfig;
use crate::session::CallerContext;
use crate::stats::StatsSnapshot;

/// One client connection
pub struct Connection<S, G: InvocationGateway> {
    session_id: u64,
    stream: S,
    config: ServerConfig,
    caller: CallerContext,
    handler: PushMessageHandler<G>,
}

impl<S, G> Connection<S, G>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
    G: InvocationGateway,
{
    /// Create a connection acting as `caller`
    pub fn new(
        session_id: u64,
        stream: S,
        config: ServerConfig,
        gateway: Arc<G>,
        caller: CallerContext,
    ) -> Self {
        let registry_config = RegistryConfig::default().max_subscriptions(config.max_subscriptions);

        Self {
            session_id,
            stream,
            config,
            caller,
            handler: PushMessageHandler::with_registry_config(gateway, registry_config),
        }
    }

    /// Drive the connection until the peer disconnects or breaks protocol
    ///
    /// All live subscriptions are closed before this returns. Returns the
    /// final multiplexer counters.
    pub async fn run(self) -> Result<StatsSnapshot> {
        let Connection {
            session_id,
            stream,
            config,
            caller,
            handler,
        } = self;

        let (mut reader, writer) = tokio::io::split(stream);
        let (tx, rx) = mpsc::unbounded_channel();
        let sink: Sender = Arc::new(tx);

        let writer_task = tokio::spawn(write_loop(session_id, writer, rx));

        let result = read_loop(&handler, &config, &caller, &mut reader, &sink).await;

        let closed = handler.close_all().await;
        tracing::debug!(
            session_id = session_id,
            closed_subscriptions = closed,
            "Connection reader finished"
        );

        // Writer exits once every bridge has dropped its sink clone
        drop(sink);
        match writer_task.await {
            Ok(Err(e)) => {
                tracing::debug!(session_id = session_id, error = %e, "Writer failed");
            }
            Err(e) => {
                tracing::error!(session_id = session_id, error = %e, "Writer task panicked");
            }
            Ok(Ok(())) => {}
        }

        result.map(|()| handler.stats())
    }
}

async fn read_loop<S, G>(
    handler: &PushMessageHandler<G>,
    config: &ServerConfig,
    caller: &CallerContext,
    reader: &mut ReadHalf<S>,
    sink: &Sender,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite,
    G: InvocationGateway,
{
    let mut decoder = FrameDecoder::with_max_frame_size(config.max_frame_size);

    loop {
        while let Some(frame) = decoder.next_frame()? {
            if let Err(e) = handler.handle_frame(&frame, caller, sink).await {
                tracing::error!(error = %e, "Closing connection on protocol violation");
                return Err(e.into());
            }
        }

        let buf = decoder.buffer_mut();
        buf.reserve(config.read_buffer_size);
        if reader.read_buf(buf).await? == 0 {
            if decoder.pending() > 0 {
                tracing::debug!(bytes = decoder.pending(), "Discarding incomplete frame at EOF");
            }
            return Ok(());
        }
    }
}

async fn write_loop<S>(
    session_id: u64,
    mut writer: WriteHalf<S>,
    mut rx: mpsc::UnboundedReceiver<ClientMessage>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite,
{
    let mut encoder = FrameEncoder::new();

    while let Some(message) = rx.recv().await {
        writer.write_all(&encoder.encode(&message)?).await?;

        // Batch whatever else is already queued into one flush
        while let Ok(message) = rx.try_recv() {
            writer.write_all(&encoder.encode(&message)?).await?;
        }
        writer.flush().await?;
    }

    tracing::trace!(session_id = session_id, "Writer drained");
    writer.shutdown().await?;
    Ok(())
}
