//! Circuit and bulkhead state snapshots

use serde::{Deserialize, Serialize};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Attempts flow through; failures are counted
    Closed,
    /// Attempts are rejected until the open duration elapses
    Open,
    /// A single probe is admitted to test recovery
    HalfOpen,
}

crate::impl_label_conversions!(CircuitState {
    Closed => "closed",
    Open => "open",
    HalfOpen => "half_open",
});

impl CircuitState {
    /// Numeric encoding used by gauges: 0 closed, 1 open, 2 half-open
    pub const fn as_gauge(&self) -> i64 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::HalfOpen => 2,
        }
    }
}

/// A state change of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: CircuitState,
    pub to: CircuitState,
}

impl StateTransition {
    pub const fn new(from: CircuitState, to: CircuitState) -> Self {
        Self { from, to }
    }
}

/// Point-in-time view of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
}

/// Point-in-time view of a bulkhead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkheadSnapshot {
    /// Calls currently holding a slot
    pub in_flight: usize,
    /// Calls waiting for a slot
    pub queued: usize,
    pub max_concurrent: usize,
    pub max_queue: usize,
    /// Calls rejected since creation
    pub rejected: u64,
}

impl BulkheadSnapshot {
    /// Slots free right now
    pub fn available(&self) -> usize {
        self.max_concurrent.saturating_sub(self.in_flight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_state_labels() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
        assert_eq!("OPEN".parse::<CircuitState>().unwrap(), CircuitState::Open);
        assert!("ajar".parse::<CircuitState>().is_err());
    }

    #[test]
    fn test_gauge_encoding() {
        assert_eq!(CircuitState::Closed.as_gauge(), 0);
        assert_eq!(CircuitState::Open.as_gauge(), 1);
        assert_eq!(CircuitState::HalfOpen.as_gauge(), 2);
    }

    #[test]
    fn test_bulkhead_available() {
        let snapshot =
            BulkheadSnapshot { in_flight: 3, queued: 1, max_concurrent: 4, max_queue: 2, rejected: 0 };
        assert_eq!(snapshot.available(), 1);
    }
}
