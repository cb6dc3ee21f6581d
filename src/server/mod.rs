//! Push server
//!
//! TCP front end: one task per connection, newline-delimited JSON frames,
//! one subscription registry per connection.

pub mod config;
pub mod connection;
pub mod listener;
pub mod resolver;

pub use config::ServerConfig;
pub use connection::Connection;
pub use listener::PushServer;
pub use resolver::{AnonymousResolver, CallerResolver};
