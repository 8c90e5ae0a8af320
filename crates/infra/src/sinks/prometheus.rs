//! Prometheus metrics for engine telemetry
//!
//! Metrics are registered on a caller-provided [`Registry`], never on the
//! process-global default one, so several registries (and tests) can coexist.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `bulwark_events_total` | counter | `class`, `kind`, `outcome` |
//! | `bulwark_attempt_duration_seconds` | histogram | `class` |
//! | `bulwark_retry_delay_seconds` | histogram | `class` |
//! | `bulwark_circuit_state` | gauge (0=closed, 1=open, 2=half-open) | `class` |
//! | `bulwark_circuit_transitions_total` | counter | `class`, `from`, `to` |

use bulwark_core::TelemetrySink;
use bulwark_domain::{EventKind, TelemetryEvent};
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry};

const DURATION_BUCKETS: [f64; 10] = [0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 10.0];
const DELAY_BUCKETS: [f64; 10] = [0.001, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0, 10.0, 30.0];

/// Sink that turns engine events into Prometheus metrics
#[derive(Debug, Clone)]
pub struct PrometheusSink {
    events: IntCounterVec,
    attempt_duration: HistogramVec,
    retry_delay: HistogramVec,
    circuit_state: IntGaugeVec,
    circuit_transitions: IntCounterVec,
}

impl PrometheusSink {
    /// Create the metrics and register them on `registry`
    ///
    /// # Errors
    /// Returns `prometheus::Error::AlreadyReg` if the registry already holds
    /// metrics with these names.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let events = IntCounterVec::new(
            Opts::new("bulwark_events_total", "Telemetry events emitted by resilience engines"),
            &["class", "kind", "outcome"],
        )?;
        registry.register(Box::new(events.clone()))?;

        let attempt_duration = HistogramVec::new(
            HistogramOpts::new(
                "bulwark_attempt_duration_seconds",
                "Duration of individual operation attempts in seconds",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["class"],
        )?;
        registry.register(Box::new(attempt_duration.clone()))?;

        let retry_delay = HistogramVec::new(
            HistogramOpts::new("bulwark_retry_delay_seconds", "Delay before each retry in seconds")
                .buckets(DELAY_BUCKETS.to_vec()),
            &["class"],
        )?;
        registry.register(Box::new(retry_delay.clone()))?;

        let circuit_state = IntGaugeVec::new(
            Opts::new(
                "bulwark_circuit_state",
                "Current circuit breaker state (0=closed, 1=open, 2=half-open)",
            ),
            &["class"],
        )?;
        registry.register(Box::new(circuit_state.clone()))?;

        let circuit_transitions = IntCounterVec::new(
            Opts::new(
                "bulwark_circuit_transitions_total",
                "Circuit breaker state transitions",
            ),
            &["class", "from", "to"],
        )?;
        registry.register(Box::new(circuit_transitions.clone()))?;

        Ok(Self { events, attempt_duration, retry_delay, circuit_state, circuit_transitions })
    }
}

impl TelemetrySink for PrometheusSink {
    fn record(&self, event: &TelemetryEvent) {
        let class = event.operation_class.as_str();
        self.events.with_label_values(&[class, event.kind.as_str(), event.outcome.as_str()]).inc();

        match event.kind {
            EventKind::Attempt => {
                self.attempt_duration
                    .with_label_values(&[class])
                    .observe(millis_to_secs(event.duration_ms));
            }
            EventKind::RetryScheduled { delay_ms } => {
                self.retry_delay.with_label_values(&[class]).observe(millis_to_secs(delay_ms));
            }
            EventKind::CircuitTransition { from, to } => {
                self.circuit_state.with_label_values(&[class]).set(to.as_gauge());
                self.circuit_transitions
                    .with_label_values(&[class, from.as_str(), to.as_str()])
                    .inc();
            }
            _ => {}
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn millis_to_secs(millis: u64) -> f64 {
    millis as f64 / 1000.0
}
