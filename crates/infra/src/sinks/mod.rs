//! Telemetry sinks
//!
//! Implementations of [`bulwark_core::TelemetrySink`] that forward engine
//! events to logs, Prometheus metrics, or several sinks at once.

pub mod fanout;
pub mod prometheus;
pub mod tracing;

pub use self::fanout::FanoutSink;
pub use self::prometheus::PrometheusSink;
pub use self::tracing::{TracingSink, TELEMETRY_TARGET};
