//! Retry policy
//!
//! [`RetryPolicy`] turns a [`RetryConfig`] into decisions: after a failed
//! attempt it says whether to try again and how long to sleep first. The
//! schedule itself is pure; jitter is the only source of randomness and is
//! applied here.

use std::future::Future;
use std::time::Duration;

use bulwark_domain::{Jitter, RetryConfig, RetrySchedule};
use rand::Rng;
use tracing::{debug, instrument, warn};

use crate::error::{ResilienceError, ResilienceResult};

/// Retry decisions derived from a [`RetryConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    schedule: RetrySchedule,
    jitter: Jitter,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            schedule: config.effective_schedule(),
            jitter: config.jitter,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The schedule actually followed, attempt bound included
    pub fn schedule(&self) -> &RetrySchedule {
        &self.schedule
    }

    /// Delay before the attempt following failed attempt `attempt`
    ///
    /// Returns `None` when the failure is not retryable or the schedule has
    /// run out.
    pub fn next_delay<E>(&self, attempt: u32, error: &ResilienceError<E>) -> Option<Duration>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if !error.is_retryable() || !self.schedule.should_continue(attempt) {
            return None;
        }
        Some(apply_jitter(self.jitter, self.schedule.delay_for(attempt)))
    }

    /// Decide what follows failed attempt `attempt`
    ///
    /// A non-retryable failure stops as-is. A retryable failure either gets a
    /// delay or, once the schedule has run out, stops wrapped in
    /// `RetryExhausted`. Every retry loop goes through here.
    pub fn decide<E>(&self, attempt: u32, error: ResilienceError<E>) -> RetryDecision<E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if !error.is_retryable() {
            debug!(attempt, kind = %error.kind(), "failure is not retryable");
            return RetryDecision::Stop(error);
        }

        match self.next_delay(attempt, &error) {
            Some(delay) => {
                warn!(attempt, delay_ms = millis(delay), error = %error, "attempt failed, retrying");
                RetryDecision::Retry { delay, error }
            }
            None => {
                warn!(attempts = attempt, error = %error, "all retry attempts exhausted");
                RetryDecision::Stop(ResilienceError::RetryExhausted {
                    attempts: attempt,
                    last: Box::new(error),
                })
            }
        }
    }

    /// Run `operation` until it succeeds or the policy stops
    ///
    /// Each call of `operation` receives the 1-based attempt number. Failures
    /// are handled by [`RetryPolicy::decide`].
    #[instrument(skip(self, operation), fields(max_attempts = self.max_attempts))]
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> ResilienceResult<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = ResilienceResult<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut attempt = 1;
        loop {
            let error = match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            match self.decide(attempt, error) {
                RetryDecision::Retry { delay, .. } => {
                    tokio::time::sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
                RetryDecision::Stop(error) => return Err(error),
            }
        }
    }
}

/// Outcome of [`RetryPolicy::decide`]
#[derive(Debug)]
pub enum RetryDecision<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Sleep for `delay`, then run the next attempt
    Retry { delay: Duration, error: ResilienceError<E> },
    /// Hand this error to the caller
    Stop(ResilienceError<E>),
}

/// Randomise `delay` according to `jitter`
pub fn apply_jitter(jitter: Jitter, delay: Duration) -> Duration {
    if delay.is_zero() {
        return delay;
    }
    let factor: f64 = match jitter {
        Jitter::None => return delay,
        Jitter::Full => rand::thread_rng().gen_range(0.0..=1.0),
        Jitter::Equal => rand::thread_rng().gen_range(0.5..=1.0),
    };
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).map_or(delay, |d| d.min(delay))
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
