//! Caller resolution for incoming connections

use std::net::SocketAddr;

use crate::session::CallerContext;

/// Decides who a new connection acts as
///
/// Runs once per connection, before any message is read. Returning `None`
/// rejects the connection.
pub trait CallerResolver: Send + Sync + 'static {
    fn resolve(&self, peer_addr: SocketAddr) -> Option<CallerContext>;
}

/// Accepts every connection as an anonymous caller
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousResolver;

impl CallerResolver for AnonymousResolver {
    fn resolve(&self, _peer_addr: SocketAddr) -> Option<CallerContext> {
        Some(CallerContext::anonymous())
    }
}

impl<F> CallerResolver for F
where
    F: Fn(SocketAddr) -> Option<CallerContext> + Send + Sync + 'static,
{
    fn resolve(&self, peer_addr: SocketAddr) -> Option<CallerContext> {
        self(peer_addr)
    }
}
