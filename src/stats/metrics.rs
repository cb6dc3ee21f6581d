//! Statistics and metrics for push connections

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters for one connection's multiplexer
///
/// Updated from the router and from every stream bridge, so all fields are
/// atomics. Use [`snapshot`](MultiplexerStats::snapshot) to read them.
#[derive(Debug)]
pub struct MultiplexerStats {
    started_at: Instant,
    subscribed: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    updates: AtomicU64,
}

impl MultiplexerStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            subscribed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            updates: AtomicU64::new(0),
        }
    }

    /// A subscription became active
    pub fn on_subscribed(&self) {
        self.subscribed.fetch_add(1, Ordering::Relaxed);
    }

    /// A subscribe request was answered with an error
    pub fn on_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// A stream completed and the client was told
    pub fn on_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// A stream failed and the client was told
    pub fn on_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A subscription was cancelled by unsubscribe or connection teardown
    pub fn on_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// An update was handed to the outbound sink
    pub fn on_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        let subscribed = self.subscribed.load(Ordering::Relaxed);
        let completed = self.completed.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let cancelled = self.cancelled.load(Ordering::Relaxed);

        StatsSnapshot {
            subscribed,
            rejected: self.rejected.load(Ordering::Relaxed),
            completed,
            failed,
            cancelled,
            updates: self.updates.load(Ordering::Relaxed),
            active: subscribed.saturating_sub(completed + failed + cancelled),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for MultiplexerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain copy of [`MultiplexerStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Subscriptions that became active
    pub subscribed: u64,
    /// Subscribe requests answered with an error
    pub rejected: u64,
    /// Streams that completed normally
    pub completed: u64,
    /// Streams that failed while running
    pub failed: u64,
    /// Subscriptions stopped by the client or by teardown
    pub cancelled: u64,
    /// Updates sent
    pub updates: u64,
    /// Subscriptions not yet terminated
    pub active: u64,
    /// Time since the counters were created
    pub uptime: Duration,
}

/// Server-wide statistics
#[derive(Debug, Default)]
pub struct ServerStats {
    total_connections: AtomicU64,
    active_connections: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// Total connections ever accepted
    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    /// Currently open connections
    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }
}
