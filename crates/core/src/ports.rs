//! Port interfaces for engine telemetry
//!
//! The engine reports every stage it runs to a [`TelemetrySink`]. Sinks are
//! injected at construction; adapters (tracing, Prometheus, fan-out) live in
//! the infrastructure crate.

use bulwark_domain::TelemetryEvent;

/// Receiver of engine telemetry
///
/// `record` is called inline on the calling task, so implementations should
/// return quickly and must not block.
pub trait TelemetrySink: Send + Sync {
    /// Record one event
    fn record(&self, event: &TelemetryEvent);
}

/// Sink that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn record(&self, _event: &TelemetryEvent) {}
}
