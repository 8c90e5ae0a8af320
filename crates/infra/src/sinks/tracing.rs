//! Telemetry as structured log records

use bulwark_core::TelemetrySink;
use bulwark_domain::{EventKind, Outcome, TelemetryEvent};
use tracing::{debug, info, warn};

/// Log target for every record written by [`TracingSink`]
pub const TELEMETRY_TARGET: &str = "bulwark::telemetry";

/// Sink that writes each event as a `tracing` record
///
/// Passed stages log at `debug`, rejections and circuit transitions at
/// `info`, and every other failure at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl TelemetrySink for TracingSink {
    fn record(&self, event: &TelemetryEvent) {
        let class = event.operation_class.as_str();
        let kind = event.kind.as_str();
        let attempt = event.attempt;
        let duration_ms = event.duration_ms;

        if let EventKind::CircuitTransition { from, to } = event.kind {
            info!(target: TELEMETRY_TARGET, class, %from, %to, "circuit state changed");
            return;
        }

        match event.outcome {
            Outcome::Passed => {
                debug!(target: TELEMETRY_TARGET, class, kind, attempt, duration_ms, "stage passed");
            }
            Outcome::Failed(error) if error.is_rejection() => {
                info!(target: TELEMETRY_TARGET, class, kind, attempt, reason = %error, "call rejected");
            }
            Outcome::Failed(error) => {
                warn!(
                    target: TELEMETRY_TARGET,
                    class, kind, attempt, duration_ms, error = %error, "stage failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bulwark_domain::{CircuitState, ErrorKind};

    use super::*;

    /// Validates every event shape is accepted without a subscriber.
    ///
    /// Assertions:
    /// - Recording transitions, passes, rejections and failures never panics
    #[test]
    fn test_records_all_event_shapes() {
        let sink = TracingSink::new();
        let events = [
            TelemetryEvent::new(
                EventKind::CircuitTransition { from: CircuitState::Closed, to: CircuitState::Open },
                "payments",
                Outcome::Passed,
            ),
            TelemetryEvent::new(EventKind::Attempt, "payments", Outcome::Passed).with_attempt(1),
            TelemetryEvent::new(
                EventKind::CircuitCheck,
                "payments",
                Outcome::Failed(ErrorKind::CircuitOpen),
            ),
            TelemetryEvent::new(EventKind::Attempt, "payments", Outcome::Failed(ErrorKind::Timeout))
                .with_attempt(2)
                .with_duration_ms(50),
        ];

        for event in &events {
            sink.record(event);
        }
    }
}
