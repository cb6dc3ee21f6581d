//! Per-connection session information

pub mod context;

pub use context::{CallerContext, Principal, ROLE_PREFIX};
