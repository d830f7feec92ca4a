//! Cancellation handles for live subscriptions.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

type CancelFn = Box<dyn FnOnce() + Send>;

/// Handle to a live subscription.
///
/// Clones share the same cancellation slot, so a handle can be held both by
/// the component that opened it and by a session-wide registry.
///
/// # Invariants
///
/// - The cancel callback runs at most once across all clones.
/// - Cancelling an already-cancelled handle is a no-op.
#[derive(Clone)]
pub struct Subscription {
    slot: Arc<Mutex<Option<CancelFn>>>,
}

impl Subscription {
    /// Wrap the store's cancel callback.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self { slot: Arc::new(Mutex::new(Some(Box::new(cancel)))) }
    }

    /// Handle with nothing to cancel.
    pub fn cancelled() -> Self {
        Self { slot: Arc::new(Mutex::new(None)) }
    }

    /// Stop delivering updates. Idempotent.
    pub fn cancel(&self) {
        // Take the callback out before running it so it runs unlocked.
        let cancel = lock(&self.slot).take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    /// Whether [`Self::cancel`] has run on any clone.
    pub fn is_cancelled(&self) -> bool {
        lock(&self.slot).is_none()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("cancelled", &self.is_cancelled()).finish()
    }
}

/// Lock a mutex, recovering the data if a holder panicked.
///
/// Every critical section in this workspace is a plain data update, so the
/// protected value is consistent even after a poisoning panic.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
