//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};

use crate::protocol::DEFAULT_MAX_FRAME_SIZE;

/// Default TCP port for the push server
pub const DEFAULT_PORT: u16 = 8765;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Maximum live subscriptions per connection (0 = unlimited)
    pub max_subscriptions: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Application-level read buffer size
    pub read_buffer_size: usize,

    /// Largest accepted inbound frame in bytes
    pub max_frame_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            max_subscriptions: 0,
            tcp_nodelay: true, // Updates are small and latency sensitive
            read_buffer_size: 8 * 1024,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set maximum live subscriptions per connection
    pub fn max_subscriptions(mut self, max: usize) -> Self {
        self.max_subscriptions = max;
        self
    }

    /// Set maximum inbound frame size (at least 1 byte)
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size.max(1);
        self
    }

    /// Set read buffer size
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }
}
