//! Declarative retry schedules
//!
//! A [`RetrySchedule`] is a small algebra of retry policies. It answers two
//! questions for the attempt that just failed (numbered from 1): should the
//! caller try again, and how long should it wait first. Both answers are pure
//! functions of the schedule and the attempt number, so schedules can be
//! compared, serialised and property-tested without a runtime.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use bulwark_domain::RetrySchedule;
//!
//! // Up to 4 retries, doubling from 100ms, never more than 500ms apart
//! let schedule = RetrySchedule::recurs(4)
//!     .and(RetrySchedule::exponential(Duration::from_millis(100), 2.0))
//!     .capped(Duration::from_millis(500));
//!
//! assert!(schedule.should_continue(4));
//! assert!(!schedule.should_continue(5));
//! assert_eq!(schedule.delay_for(1), Duration::from_millis(100));
//! assert_eq!(schedule.delay_for(4), Duration::from_millis(500));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, ConfigResult};
use crate::serde_utils::duration_millis;

/// Retry policy expressed as a composable sum type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RetrySchedule {
    /// Continue while the failed attempt number is at most `max`; no delay
    Recurs { max: u32 },

    /// Always continue, waiting a fixed delay
    Spaced {
        #[serde(with = "duration_millis")]
        delay: Duration,
    },

    /// Always continue, waiting `base * factor^(n-1)`
    Exponential {
        #[serde(with = "duration_millis")]
        base: Duration,
        factor: f64,
    },

    /// Continue only if both continue; wait the longer of the two delays
    Composed { first: Box<RetrySchedule>, second: Box<RetrySchedule> },

    /// Continue if `inner` continues; delay clamped to `max_delay`
    Capped {
        inner: Box<RetrySchedule>,
        #[serde(with = "duration_millis")]
        max_delay: Duration,
    },
}

impl RetrySchedule {
    pub fn recurs(max: u32) -> Self {
        Self::Recurs { max }
    }

    pub fn spaced(delay: Duration) -> Self {
        Self::Spaced { delay }
    }

    pub fn exponential(base: Duration, factor: f64) -> Self {
        Self::Exponential { base, factor }
    }

    /// Intersect two schedules
    pub fn and(self, other: RetrySchedule) -> Self {
        Self::Composed { first: Box::new(self), second: Box::new(other) }
    }

    /// Clamp every delay of this schedule to `max_delay`
    pub fn capped(self, max_delay: Duration) -> Self {
        Self::Capped { inner: Box::new(self), max_delay }
    }

    /// Whether another attempt should follow failed attempt `attempt`
    ///
    /// `attempt` is 1-based: `should_continue(1)` is asked after the first
    /// attempt fails.
    pub fn should_continue(&self, attempt: u32) -> bool {
        match self {
            Self::Recurs { max } => attempt <= *max,
            Self::Spaced { .. } | Self::Exponential { .. } => true,
            Self::Composed { first, second } => {
                first.should_continue(attempt) && second.should_continue(attempt)
            }
            Self::Capped { inner, .. } => inner.should_continue(attempt),
        }
    }

    /// Delay to wait after failed attempt `attempt` before the next one
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Self::Recurs { .. } => Duration::ZERO,
            Self::Spaced { delay } => *delay,
            Self::Exponential { base, factor } => exponential_delay(*base, *factor, attempt),
            Self::Composed { first, second } => {
                first.delay_for(attempt).max(second.delay_for(attempt))
            }
            Self::Capped { inner, max_delay } => inner.delay_for(attempt).min(*max_delay),
        }
    }

    /// Check that every node of the schedule is well-formed
    pub fn validate(&self) -> ConfigResult<()> {
        match self {
            Self::Recurs { .. } | Self::Spaced { .. } => Ok(()),
            Self::Exponential { factor, .. } => {
                if factor.is_finite() && *factor > 0.0 {
                    Ok(())
                } else {
                    Err(ConfigError::invalid(
                        "retry.backoff.factor",
                        format!("factor must be a positive finite number, got {factor}"),
                    ))
                }
            }
            Self::Composed { first, second } => {
                first.validate()?;
                second.validate()
            }
            Self::Capped { inner, .. } => inner.validate(),
        }
    }
}

fn exponential_delay(base: Duration, factor: f64, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
    let nanos = (base.as_nanos() as f64 * factor.powi(exponent)).round();

    if !nanos.is_finite() || nanos >= u64::MAX as f64 {
        return Duration::MAX;
    }
    if nanos <= 0.0 {
        return Duration::ZERO;
    }

    Duration::from_nanos(nanos as u64)
}

/// Randomisation applied to a computed delay before sleeping
///
/// Jitter is applied by the executor, never by [`RetrySchedule::delay_for`],
/// which stays deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Jitter {
    /// Use the computed delay as-is
    #[default]
    None,
    /// Uniform in `[0, delay]`
    Full,
    /// Uniform in `[delay / 2, delay]`
    Equal,
}

crate::impl_label_conversions!(Jitter {
    None => "none",
    Full => "full",
    Equal => "equal",
});

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_recurs_counts_failed_attempts() {
        let schedule = RetrySchedule::recurs(2);

        assert!(schedule.should_continue(1));
        assert!(schedule.should_continue(2));
        assert!(!schedule.should_continue(3));
        assert_eq!(schedule.delay_for(1), Duration::ZERO);
    }

    #[test]
    fn test_recurs_zero_never_continues() {
        assert!(!RetrySchedule::recurs(0).should_continue(1));
    }

    #[test]
    fn test_spaced_is_constant() {
        let schedule = RetrySchedule::spaced(ms(250));

        assert!(schedule.should_continue(1_000));
        assert_eq!(schedule.delay_for(1), ms(250));
        assert_eq!(schedule.delay_for(9), ms(250));
    }

    #[test]
    fn test_exponential_delays() {
        let schedule = RetrySchedule::exponential(ms(100), 2.0);

        assert_eq!(schedule.delay_for(1), ms(100));
        assert_eq!(schedule.delay_for(2), ms(200));
        assert_eq!(schedule.delay_for(3), ms(400));
        assert_eq!(schedule.delay_for(5), ms(1600));
    }

    #[test]
    fn test_exponential_saturates() {
        let schedule = RetrySchedule::exponential(ms(1000), 10.0);
        assert_eq!(schedule.delay_for(u32::MAX), Duration::MAX);
    }

    #[test]
    fn test_composed_takes_max_delay_and_both_continue() {
        let schedule = RetrySchedule::recurs(3).and(RetrySchedule::spaced(ms(50)));

        assert_eq!(schedule.delay_for(1), ms(50));
        assert!(schedule.should_continue(3));
        assert!(!schedule.should_continue(4));
    }

    #[test]
    fn test_capped_clamps_delay() {
        let schedule = RetrySchedule::exponential(ms(100), 3.0).capped(ms(500));

        assert_eq!(schedule.delay_for(2), ms(300));
        assert_eq!(schedule.delay_for(3), ms(500));
        assert!(schedule.should_continue(50));
    }

    #[test]
    fn test_validate_rejects_bad_factor() {
        assert!(RetrySchedule::exponential(ms(10), 0.0).validate().is_err());
        assert!(RetrySchedule::exponential(ms(10), -1.5).validate().is_err());
        assert!(RetrySchedule::exponential(ms(10), f64::NAN).validate().is_err());

        let nested = RetrySchedule::recurs(3).and(RetrySchedule::exponential(ms(10), 0.0));
        assert!(nested.validate().is_err());
        assert!(RetrySchedule::exponential(ms(10), 1.5).validate().is_ok());
    }

    #[test]
    fn test_schedule_toml_shape() {
        let toml_src = r#"
            type = "composed"

            [first]
            type = "recurs"
            max = 2

            [second]
            type = "exponential"
            base = 100
            factor = 2.0
        "#;

        let schedule: RetrySchedule = toml::from_str(toml_src).expect("valid schedule");
        assert_eq!(
            schedule,
            RetrySchedule::recurs(2).and(RetrySchedule::exponential(ms(100), 2.0))
        );
    }

    #[test]
    fn test_exponential_delays_with_fractional_factors() {
        let schedule = RetrySchedule::exponential(ms(100), 1.5);
        assert_eq!(schedule.delay_for(1), ms(100));
        assert_eq!(schedule.delay_for(2), ms(150));
        assert_eq!(schedule.delay_for(3), ms(225));
        assert_eq!(schedule.delay_for(4), Duration::from_micros(337_500));

        let schedule = RetrySchedule::exponential(ms(10), 3.0);
        assert_eq!(schedule.delay_for(3), ms(90));
        assert_eq!(schedule.delay_for(4), ms(270));
    }

    #[test]
    fn test_jitter_labels() {
        assert_eq!(Jitter::default(), Jitter::None);
        assert_eq!("FULL".parse::<Jitter>().unwrap(), Jitter::Full);
        assert_eq!(Jitter::Equal.to_string(), "equal");
    }

    proptest! {
        #[test]
        fn exponential_is_non_decreasing(
            base in 1u64..10_000,
            factor in 1.0f64..4.0,
            attempt in 1u32..40,
        ) {
            let schedule = RetrySchedule::exponential(ms(base), factor);
            prop_assert!(schedule.delay_for(attempt + 1) >= schedule.delay_for(attempt));
        }

        /// `delay_for(n + 1) == delay_for(n) * factor`, up to the rounding of
        /// each delay to whole nanoseconds (at most `(1 + factor) / 2` ns) and
        /// f64 precision on large values.
        #[test]
        fn exponential_scales_by_factor(
            base in 1u64..10_000,
            factor in 1.0f64..4.0,
            attempt in 1u32..24,
        ) {
            let schedule = RetrySchedule::exponential(ms(base), factor);
            let current = schedule.delay_for(attempt).as_nanos() as f64;
            let next = schedule.delay_for(attempt + 1).as_nanos() as f64;
            prop_assume!(next < 1e18);

            let tolerance = (1.0 + factor) / 2.0 + next * 1e-12;
            prop_assert!(
                (next - current * factor).abs() <= tolerance,
                "delay_for({}) = {}ns, expected {}ns",
                attempt + 1,
                next,
                current * factor
            );
        }

        #[test]
        fn composed_continues_iff_both_continue(
            a in 0u32..20,
            b in 0u32..20,
            attempt in 1u32..30,
        ) {
            let schedule = RetrySchedule::recurs(a).and(RetrySchedule::recurs(b));
            prop_assert_eq!(schedule.should_continue(attempt), attempt <= a.min(b));
        }

        #[test]
        fn capped_never_exceeds_cap(
            base in 1u64..5_000,
            cap in 1u64..60_000,
            attempt in 1u32..64,
        ) {
            let schedule = RetrySchedule::exponential(ms(base), 2.0).capped(ms(cap));
            prop_assert!(schedule.delay_for(attempt) <= ms(cap));
        }
    }
}
