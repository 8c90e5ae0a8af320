//! Domain types shared by the engine and its adapters

pub mod events;
pub mod state;
pub mod stats;

pub use events::{ErrorKind, EventKind, Outcome, TelemetryEvent};
pub use state::{BulkheadSnapshot, CircuitSnapshot, CircuitState, StateTransition};
pub use stats::HealthStats;
