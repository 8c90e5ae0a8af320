//! Health statistics snapshot

use serde::{Deserialize, Serialize};

use crate::constants::OPTIMISTIC_HEALTH_SCORE;

/// Counters observed by an engine since creation or the last reset
///
/// Every attempt lands in exactly one of `successes`, `failures` or
/// `rejections`. Timeouts are failures and are additionally counted in
/// `timeouts`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStats {
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub rejections: u64,
}

impl HealthStats {
    /// Attempts that reached the operation
    pub fn executed(&self) -> u64 {
        self.successes.saturating_add(self.failures)
    }

    /// Percentage of executed attempts that succeeded
    ///
    /// Returns 100 when nothing has executed yet. Rejections do not count.
    pub fn health_score(&self) -> f64 {
        let executed = self.executed();
        if executed == 0 {
            return OPTIMISTIC_HEALTH_SCORE;
        }
        self.successes as f64 / executed as f64 * 100.0
    }
}
