//! Test helpers for asserting on engine telemetry

use bulwark_domain::TelemetryEvent;
use parking_lot::Mutex;

use crate::ports::TelemetrySink;

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct CapturingSink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl CapturingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events recorded so far, oldest first
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    /// Labels of the recorded event kinds, oldest first
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|event| event.kind.as_str()).collect()
    }

    /// Number of recorded events whose kind has the given label
    pub fn count(&self, kind: &str) -> usize {
        self.events.lock().iter().filter(|event| event.kind.as_str() == kind).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl TelemetrySink for CapturingSink {
    fn record(&self, event: &TelemetryEvent) {
        self.events.lock().push(event.clone());
    }
}
