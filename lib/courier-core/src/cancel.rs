//! Request cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Cloneable cancellation handle.
///
/// Every clone observes the same state: once [`cancel`](Self::cancel) is
/// called, pending and future waits on any clone complete immediately.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    /// New, not yet cancelled, signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every request observing this signal.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    /// Returns `true` once cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Wait until the signal is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            // registered before the check, so a concurrent cancel is not lost
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
