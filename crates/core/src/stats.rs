//! Lock-free health counters
//!
//! Counters are updated at every attempt boundary with relaxed atomics;
//! a snapshot is not guaranteed to be consistent across fields.

use std::sync::atomic::{AtomicU64, Ordering};

use bulwark_common::{ResilienceError, ResilienceResult};
use bulwark_domain::HealthStats;

/// Thread-safe counters behind [`HealthStats`]
#[derive(Debug, Default)]
pub struct HealthCounters {
    successes: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    rejections: AtomicU64,
}

impl HealthCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A timeout is a failure that is also counted on its own
    pub fn record_timeout(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Count the outcome of one attempt that reached the operation
    pub fn record_attempt<T, E>(&self, result: &ResilienceResult<T, E>)
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        match result {
            Ok(_) => self.record_success(),
            Err(ResilienceError::Timeout { .. }) => self.record_timeout(),
            Err(error) if error.is_rejection() => self.record_rejection(),
            Err(_) => self.record_failure(),
        }
    }

    pub fn snapshot(&self) -> HealthStats {
        HealthStats {
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.successes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.timeouts.store(0, Ordering::Relaxed);
        self.rejections.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use super::*;

    fn op_error() -> ResilienceError<io::Error> {
        ResilienceError::operation(io::Error::new(io::ErrorKind::Other, "down"))
    }

    /// Validates attempt outcomes land in the right counters.
    ///
    /// Assertions:
    /// - Confirms a timeout counts as a failure and a timeout.
    /// - Confirms `CircuitOpen` counts only as a rejection.
    #[test]
    fn test_record_attempt_classification() {
        let counters = HealthCounters::new();

        counters.record_attempt::<u8, io::Error>(&Ok(1));
        counters.record_attempt::<u8, io::Error>(&Err(op_error()));
        counters.record_attempt::<u8, io::Error>(&Err(ResilienceError::Timeout {
            timeout: Duration::from_millis(10),
        }));
        counters.record_attempt::<u8, io::Error>(&Err(ResilienceError::CircuitOpen));

        let stats = counters.snapshot();
        assert_eq!(stats, HealthStats { successes: 1, failures: 2, timeouts: 1, rejections: 1 });
        assert!((stats.health_score() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_clears_everything() {
        let counters = HealthCounters::new();
        counters.record_success();
        counters.record_timeout();
        counters.record_rejection();

        counters.reset();
        assert_eq!(counters.snapshot(), HealthStats::default());
    }
}
