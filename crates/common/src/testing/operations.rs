//! Scripted operations for exercising resilience primitives

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Error returned by scripted operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TestError {
    pub message: String,
}

impl TestError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Operation that fails a fixed number of times, then succeeds
///
/// Clones share the invocation counter. Each successful call returns the
/// 1-based invocation number.
#[derive(Debug, Clone)]
pub struct FlakyOperation {
    failures: u32,
    calls: Arc<AtomicU32>,
}

impl FlakyOperation {
    /// Fails the first `failures` invocations
    pub fn failing_times(failures: u32) -> Self {
        Self { failures, calls: Arc::new(AtomicU32::new(0)) }
    }

    /// Never succeeds
    pub fn always_failing() -> Self {
        Self::failing_times(u32::MAX)
    }

    /// Always succeeds
    pub fn always_succeeding() -> Self {
        Self::failing_times(0)
    }

    /// Invoke the operation once
    pub fn call(&self) -> impl Future<Output = Result<u32, TestError>> + Send + 'static {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = if call <= self.failures {
            Err(TestError::new(format!("scripted failure {call}")))
        } else {
            Ok(call)
        };
        std::future::ready(outcome)
    }

    /// Number of invocations so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flaky_operation_script() {
        let op = FlakyOperation::failing_times(1);
        let clone = op.clone();

        assert_eq!(op.call().await, Err(TestError::new("scripted failure 1")));
        assert_eq!(clone.call().await, Ok(2));
        assert_eq!(op.calls(), 2);
    }

    #[tokio::test]
    async fn test_always_variants() {
        assert!(FlakyOperation::always_failing().call().await.is_err());
        assert_eq!(FlakyOperation::always_succeeding().call().await, Ok(1));
    }
}
