//! Logging sink used by the client and its stages.

use std::fmt;

/// Leveled log sink.
///
/// The client routes its own diagnostics through a `Logger` so embedding
/// applications can redirect or silence them. The default forwards to
/// `tracing`.
pub trait Logger: Send + Sync {
    /// Debug level message.
    fn debug(&self, message: fmt::Arguments<'_>);
    /// Warning level message.
    fn warn(&self, message: fmt::Arguments<'_>);
    /// Error level message.
    fn error(&self, message: fmt::Arguments<'_>);
}

/// Logger forwarding to `tracing` events with the `courier` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: fmt::Arguments<'_>) {
        tracing::debug!(target: "courier", "{message}");
    }

    fn warn(&self, message: fmt::Arguments<'_>) {
        tracing::warn!(target: "courier", "{message}");
    }

    fn error(&self, message: fmt::Arguments<'_>) {
        tracing::error!(target: "courier", "{message}");
    }
}

/// Logger that drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLogger;

impl Logger for DisabledLogger {
    fn debug(&self, _message: fmt::Arguments<'_>) {}

    fn warn(&self, _message: fmt::Arguments<'_>) {}

    fn error(&self, _message: fmt::Arguments<'_>) {}
}
