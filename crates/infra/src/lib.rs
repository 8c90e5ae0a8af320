//! # Bulwark Infrastructure
//!
//! Adapters around the resilience engine.
//!
//! This crate contains:
//! - Settings loading from TOML/JSON files with environment overrides
//! - Telemetry sinks for `tracing`, Prometheus, and fan-out to several sinks
//! - Global `tracing` subscriber setup
//!
//! ## Architecture
//! - Implements [`bulwark_core::TelemetrySink`]
//! - Depends on `bulwark-domain` and `bulwark-core`
//! - Contains the I/O the engine itself never performs

pub mod config;
pub mod logging;
pub mod sinks;

// Re-export commonly used items
pub use config::{load, load_from_file, LoadError};
pub use logging::{init_logging, LogFormat, LoggingError};
pub use sinks::{FanoutSink, PrometheusSink, TracingSink};
