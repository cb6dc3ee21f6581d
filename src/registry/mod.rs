//! Subscription registry
//!
//! The registry is the only mutable state shared between the message
//! router and the stream bridges of one connection. It maps each live
//! subscription id to the handle that stops it.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<SubscriptionRegistry>
//!                 ┌──────────────────────────────┐
//!                 │ entries: HashMap<Id,         │
//!                 │   RegistryEntry {            │
//!                 │     generation,              │
//!                 │     handle: CloseHandle,     │
//!                 │   }                          │
//!                 │ >                            │
//!                 └───────┬──────────────┬───────┘
//!                         │              │
//!        insert / remove  │              │  remove_if_current
//!                         │              │
//!                 [Message Router]   [Stream Bridge] x N
//! ```
//!
//! # Ownership
//!
//! Whoever removes an entry owns its handle. Unsubscribe removes and closes;
//! a bridge removes its own entry (matched by generation) when its stream
//! ends and only then reports the terminal event. A removal can succeed at
//! most once per entry, so exactly one party ever acts on termination.

pub mod config;
pub mod entry;
pub mod error;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{CloseHandle, Registration, RegistryEntry};
pub use error::RegistryError;
pub use store::SubscriptionRegistry;
