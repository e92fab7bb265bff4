//! Per-call timing.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Timings collected for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraceInfo {
    /// Time until the last hop's request was handed to a connection.
    pub request_sent: Option<Duration>,
    /// Time until the last hop's response headers arrived.
    pub first_response_byte: Option<Duration>,
    /// Time until the call completed, body read included.
    pub total: Option<Duration>,
    /// Number of redirects followed.
    pub redirects: usize,
}

/// Shared trace handle, attached to the transport request as an extension.
///
/// The transport, the dispatcher and the response all record into the same
/// handle; every duration is measured from the handle's creation.
#[derive(Debug, Clone)]
pub struct Trace {
    started: Instant,
    info: Arc<Mutex<TraceInfo>>,
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}

impl Trace {
    /// Start a trace now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            info: Arc::default(),
        }
    }

    /// Instant the trace started.
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started
    }

    /// Record that the request was handed to a connection.
    pub fn record_request_sent(&self) {
        let elapsed = self.started.elapsed();
        self.update(|info| info.request_sent = Some(elapsed));
    }

    /// Record that response headers arrived.
    pub fn record_first_byte(&self) {
        let elapsed = self.started.elapsed();
        self.update(|info| info.first_response_byte = Some(elapsed));
    }

    /// Record one followed redirect.
    pub fn record_redirect(&self) {
        self.update(|info| info.redirects += 1);
    }

    /// Record completion of the call.
    pub fn record_total(&self) {
        let elapsed = self.started.elapsed();
        self.update(|info| info.total = Some(elapsed));
    }

    /// Snapshot of the timings recorded so far.
    #[must_use]
    pub fn info(&self) -> TraceInfo {
        *self.info.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, apply: impl FnOnce(&mut TraceInfo)) {
        apply(&mut self.info.lock().unwrap_or_else(PoisonError::into_inner));
    }
}
