//! Broadcast events to several sinks

use std::sync::Arc;

use bulwark_core::TelemetrySink;
use bulwark_domain::TelemetryEvent;

/// Sink that forwards every event to each inner sink, in insertion order
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink to the end of the chain
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl TelemetrySink for FanoutSink {
    fn record(&self, event: &TelemetryEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}

impl std::fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutSink").field("sinks", &self.sinks.len()).finish()
    }
}
