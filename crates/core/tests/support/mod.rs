//! Shared helpers for `bulwark-core` integration tests.
//!
//! Integration tests see the crate from outside, so they carry their own
//! recording sink instead of the crate-internal one.

use std::sync::Arc;

use bulwark_common::MockClock;
use bulwark_core::{EngineBuilder, ResilienceEngine, TelemetrySink};
use bulwark_domain::{EventKind, ResilienceConfig, TelemetryEvent};
use parking_lot::Mutex;

/// In-memory sink recording every telemetry event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&EventKind) -> bool) -> usize {
        self.events.lock().iter().filter(|event| matches(&event.kind)).count()
    }
}

impl TelemetrySink for RecordingSink {
    fn record(&self, event: &TelemetryEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Engine wired to a mock clock and a recording sink.
pub struct Harness {
    pub engine: Arc<ResilienceEngine>,
    pub clock: MockClock,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn new(operation_class: &str, config: ResilienceConfig) -> Self {
        let clock = MockClock::new();
        let sink = Arc::new(RecordingSink::default());
        let engine = EngineBuilder::new(operation_class, config)
            .sink(Arc::clone(&sink) as Arc<dyn TelemetrySink>)
            .clock(Arc::new(clock.clone()))
            .build()
            .expect("valid engine config");

        Self { engine: Arc::new(engine), clock, sink }
    }
}
