//! Push server listener
//!
//! Handles TCP accept loop and spawns connection handlers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::gateway::InvocationGateway;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::server::resolver::{AnonymousResolver, CallerResolver};
use crate::stats::ServerStats;

/// Push server
///
/// Every accepted connection gets its own subscription registry; nothing is
/// shared between connections except the gateway.
pub struct PushServer<G: InvocationGateway> {
    config: ServerConfig,
    gateway: Arc<G>,
    resolver: Arc<dyn CallerResolver>,
    stats: Arc<ServerStats>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl<G: InvocationGateway> PushServer<G> {
    /// Create a new server that treats every caller as anonymous
    pub fn new(config: ServerConfig, gateway: G) -> Self {
        Self::with_gateway(config, Arc::new(gateway))
    }

    /// Create a new server around a shared gateway
    pub fn with_gateway(config: ServerConfig, gateway: Arc<G>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            gateway,
            resolver: Arc::new(AnonymousResolver),
            stats: Arc::new(ServerStats::new()),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Set how connections are mapped to callers
    pub fn with_resolver<R: CallerResolver>(mut self, resolver: R) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Server-wide counters
    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.run_on(listener, shutdown).await
    }

    /// Serve connections from an already bound listener
    pub async fn run_on<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tracing::info!(addr = %listener.local_addr()?, "Push server listening");

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        }
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit; the permit lives as long as the connection task
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let Some(caller) = self.resolver.resolve(peer_addr) else {
            tracing::warn!(peer = %peer_addr, "Connection rejected: caller not resolved");
            return;
        };

        // Generate session ID
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            principal = ?caller.principal().map(|p| p.name.as_str()),
            "New connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let config = self.config.clone();
        let gateway = Arc::clone(&self.gateway);
        let stats = Arc::clone(&self.stats);

        stats.on_connection_opened();
        tokio::spawn(async move {
            let _permit = permit;
            let connection = Connection::new(session_id, socket, config, gateway, caller);

            match connection.run().await {
                Ok(summary) => {
                    tracing::debug!(
                        session_id = session_id,
                        subscribed = summary.subscribed,
                        completed = summary.completed,
                        failed = summary.failed,
                        cancelled = summary.cancelled,
                        "Connection closed"
                    );
                }
                Err(e) => {
                    tracing::debug!(session_id = session_id, error = %e, "Connection error");
                }
            }

            stats.on_connection_closed();
        });
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
