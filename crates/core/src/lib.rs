//! # Bulwark Core
//!
//! The resilience pipeline and the ports it reports through.
//!
//! This crate contains:
//! - [`ResilienceEngine`], which composes the `bulwark-common` primitives
//!   into one fixed pipeline per operation class
//! - The [`TelemetrySink`] port the engine reports every stage to
//! - Lock-free health counters and the [`EngineRegistry`]
//!
//! ## Architecture Principles
//! - Only depends on `bulwark-common` and `bulwark-domain`
//! - No file, network or metrics backend code; adapters live in `bulwark-infra`
//! - Telemetry and time are injected, never constructed globally

pub mod engine;
pub mod ports;
pub mod registry;
pub mod stats;

#[cfg(any(feature = "test-utils", test))]
pub mod testing;

pub use engine::{
    create_resilience_engine, AttemptContext, EngineBuilder, ResilienceEngine, SharedClock,
};
pub use ports::{NoopSink, TelemetrySink};
pub use registry::EngineRegistry;
pub use stats::HealthCounters;
