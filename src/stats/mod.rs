//! Connection and server statistics

pub mod metrics;

pub use metrics::{MultiplexerStats, ServerStats, StatsSnapshot};
