//! Registry entry and close handle types
//!
//! This module defines the per-subscription state stored in the registry.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

/// Handle that stops one subscription
///
/// Pairs a cancellation token (observed by the stream bridge) with an emit
/// gate. Updates are emitted while holding the gate, and [`close`] takes the
/// gate before cancelling, so once `close` returns no further update can be
/// emitted for the subscription.
///
/// [`close`]: CloseHandle::close
#[derive(Debug, Clone)]
pub struct CloseHandle {
    inner: Arc<CloseInner>,
}

#[derive(Debug)]
struct CloseInner {
    token: CancellationToken,
    closed: Mutex<bool>,
}

impl CloseHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CloseInner {
                token: CancellationToken::new(),
                closed: Mutex::new(false),
            }),
        }
    }

    /// Request the producer to stop and shut the emit gate
    ///
    /// Idempotent.
    pub fn close(&self) {
        let mut closed = self.lock();
        *closed = true;
        self.inner.token.cancel();
    }

    /// Whether [`close`](CloseHandle::close) has been called
    pub fn is_closed(&self) -> bool {
        *self.lock()
    }

    /// Run `emit` unless the handle is closed
    ///
    /// Returns `false` without running `emit` if the handle was closed.
    /// `emit` must not block; it runs with the gate held.
    pub fn emit_if_open<F: FnOnce()>(&self, emit: F) -> bool {
        let closed = self.lock();
        if *closed {
            return false;
        }
        emit();
        true
    }

    /// Token cancelled by [`close`](CloseHandle::close)
    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        // The guarded flag is a plain bool; a panic elsewhere cannot leave it torn.
        self.inner.closed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CloseHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry for a single live subscription in the registry
#[derive(Debug)]
pub struct RegistryEntry {
    /// Distinguishes this subscription from earlier ones that used the same id
    pub generation: u64,

    /// Handle that stops the subscription
    pub handle: CloseHandle,
}

impl RegistryEntry {
    pub(super) fn new(generation: u64, handle: CloseHandle) -> Self {
        Self {
            generation,
            handle,
        }
    }
}

/// Receipt for a successful insert
///
/// Carries the generation the stream bridge must present when it removes
/// its own entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_while_open() {
        let handle = CloseHandle::new();
        let mut emitted = 0;

        assert!(handle.emit_if_open(|| emitted += 1));
        assert!(handle.emit_if_open(|| emitted += 1));
        assert_eq!(emitted, 2);
        assert!(!handle.is_closed());
        assert!(!handle.token().is_cancelled());
    }

    #[test]
    fn test_close_blocks_emit() {
        let handle = CloseHandle::new();
        let clone = handle.clone();

        handle.close();

        let mut emitted = false;
        assert!(!clone.emit_if_open(|| emitted = true));
        assert!(!emitted);
        assert!(clone.is_closed());
        assert!(clone.token().is_cancelled());
    }

    #[test]
    fn test_close_idempotent() {
        let handle = CloseHandle::new();
        handle.close();
        handle.close();

        assert!(handle.is_closed());
    }

    #[test]
    fn test_close_wakes_cancellation_waiter() {
        let handle = CloseHandle::new();
        let token = handle.token().clone();
        let mut waiter = tokio_test::task::spawn(token.cancelled_owned());

        tokio_test::assert_pending!(waiter.poll());

        handle.close();

        assert!(waiter.is_woken());
        tokio_test::assert_ready!(waiter.poll());
    }
}
