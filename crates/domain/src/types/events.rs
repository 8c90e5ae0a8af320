//! Telemetry event types
//!
//! The engine describes everything it does as a [`TelemetryEvent`] and hands
//! it to an injected sink. These types carry no behaviour.

use serde::{Deserialize, Serialize};

use super::state::CircuitState;

/// Classification of a resilience failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Operation,
    Timeout,
    CircuitOpen,
    BulkheadFull,
    RateLimitExceeded,
    RetryExhausted,
    Panicked,
}

crate::impl_label_conversions!(ErrorKind {
    Operation => "operation",
    Timeout => "timeout",
    CircuitOpen => "circuit_open",
    BulkheadFull => "bulkhead_full",
    RateLimitExceeded => "rate_limit_exceeded",
    RetryExhausted => "retry_exhausted",
    Panicked => "panicked",
});

impl ErrorKind {
    /// Rejections never reached the operation
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::CircuitOpen | Self::BulkheadFull | Self::RateLimitExceeded)
    }
}

/// Pipeline stage or boundary an event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    BulkheadAdmission,
    RateLimit,
    CircuitCheck,
    CircuitTransition { from: CircuitState, to: CircuitState },
    Attempt,
    RetryScheduled { delay_ms: u64 },
    Fallback,
    CallCompleted,
}

impl EventKind {
    /// Stable label for metrics and logs
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BulkheadAdmission => "bulkhead_admission",
            Self::RateLimit => "rate_limit",
            Self::CircuitCheck => "circuit_check",
            Self::CircuitTransition { .. } => "circuit_transition",
            Self::Attempt => "attempt",
            Self::RetryScheduled { .. } => "retry_scheduled",
            Self::Fallback => "fallback",
            Self::CallCompleted => "call_completed",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the stage an event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed(ErrorKind),
}

impl Outcome {
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed(kind) => kind.as_str(),
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation emitted by an engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub kind: EventKind,
    pub operation_class: String,
    /// 1-based attempt number, 0 for call-level events
    pub attempt: u32,
    /// Time spent in the stage
    pub duration_ms: u64,
    pub outcome: Outcome,
}

impl TelemetryEvent {
    pub fn new(kind: EventKind, operation_class: impl Into<String>, outcome: Outcome) -> Self {
        Self { kind, operation_class: operation_class.into(), attempt: 0, duration_ms: 0, outcome }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_kinds() {
        assert!(ErrorKind::CircuitOpen.is_rejection());
        assert!(ErrorKind::BulkheadFull.is_rejection());
        assert!(ErrorKind::RateLimitExceeded.is_rejection());
        assert!(!ErrorKind::Timeout.is_rejection());
        assert!(!ErrorKind::Panicked.is_rejection());
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Passed.as_str(), "passed");
        assert_eq!(Outcome::Failed(ErrorKind::Timeout).to_string(), "timeout");
    }

    #[test]
    fn test_event_kind_labels() {
        let transition =
            EventKind::CircuitTransition { from: CircuitState::Closed, to: CircuitState::Open };
        assert_eq!(transition.as_str(), "circuit_transition");
        assert_eq!(EventKind::RetryScheduled { delay_ms: 10 }.to_string(), "retry_scheduled");
    }

    #[test]
    fn test_event_builder() {
        let event = TelemetryEvent::new(EventKind::Attempt, "payments", Outcome::Passed)
            .with_attempt(2)
            .with_duration_ms(15);

        assert_eq!(event.operation_class, "payments");
        assert_eq!(event.attempt, 2);
        assert_eq!(event.duration_ms, 15);
    }

    #[test]
    fn test_event_serializes_with_tagged_kind() {
        let event = TelemetryEvent::new(
            EventKind::RetryScheduled { delay_ms: 200 },
            "search",
            Outcome::Failed(ErrorKind::Operation),
        );
        let json = serde_json::to_value(&event).expect("serialize");

        assert_eq!(json["kind"]["type"], "retry_scheduled");
        assert_eq!(json["kind"]["delay_ms"], 200);
        assert_eq!(json["outcome"]["failed"], "operation");
    }
}
