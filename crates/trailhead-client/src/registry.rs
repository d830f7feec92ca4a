//! Subscription lifecycle registry.
//!
//! Every live subscription opened during a signed-in session is registered
//! here, so the whole set can be torn down at once when the session ends.
//! The registry is session-scoped and shared by reference, never global.

use std::sync::Mutex;

use trailhead_core::{Subscription, lock};

/// Ledger of cancellation handles for one session.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    handles: Mutex<Vec<Subscription>>,
}

impl SubscriptionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a handle.
    ///
    /// Handles cancelled by their owner since the last registration are
    /// dropped from the ledger here.
    pub fn register(&self, handle: Subscription) {
        let mut handles = lock(&self.handles);
        handles.retain(|h| !h.is_cancelled());
        handles.push(handle);
    }

    /// Cancel every registered handle and empty the ledger.
    ///
    /// Returns the number of handles that were still live. Safe to call any
    /// number of times.
    pub fn clear_all(&self) -> usize {
        // Cancel outside the lock: a cancel callback may re-enter the store.
        let handles = std::mem::take(&mut *lock(&self.handles));
        let live = handles.iter().filter(|h| !h.is_cancelled()).count();
        for handle in &handles {
            handle.cancel();
        }
        tracing::debug!("cleared {} subscriptions ({} live)", handles.len(), live);
        live
    }

    /// Number of live handles.
    pub fn live_count(&self) -> usize {
        lock(&self.handles).iter().filter(|h| !h.is_cancelled()).count()
    }
}
