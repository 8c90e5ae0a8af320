//! Token bucket rate limiter
//!
//! The bucket holds up to `burst` tokens and refills continuously at
//! `requests_per_second`. It starts full. Each call takes one token; when
//! none is left the call is rejected immediately, never queued.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bulwark_domain::{ConfigResult, RateLimitConfig};
use parking_lot::Mutex;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::ResilienceError;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket rate limiter
///
/// # Examples
///
/// ```rust
/// use bulwark_common::resilience::TokenBucket;
/// use bulwark_domain::RateLimitConfig;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = TokenBucket::new(RateLimitConfig::new(5.0).with_burst(2))?;
///
/// assert!(limiter.try_acquire());
/// assert!(limiter.try_acquire());
/// assert!(!limiter.try_acquire());
/// # Ok(())
/// # }
/// ```
pub struct TokenBucket<C: Clock = SystemClock> {
    config: RateLimitConfig,
    capacity: f64,
    bucket: Arc<Mutex<Bucket>>,
    clock: Arc<C>,
}

impl TokenBucket<SystemClock> {
    pub fn new(config: RateLimitConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> TokenBucket<C> {
    /// Create a new token bucket with custom clock
    pub fn with_clock(config: RateLimitConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;

        let capacity = f64::from(config.effective_burst());
        let bucket = Bucket { tokens: capacity, last_refill: clock.now() };
        Ok(Self { config, capacity, bucket: Arc::new(Mutex::new(bucket)), clock: Arc::new(clock) })
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    fn refilled(&self, bucket: Bucket, now: Instant) -> Bucket {
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        let tokens = (bucket.tokens + elapsed * self.config.requests_per_second).min(self.capacity);
        Bucket { tokens, last_refill: now }
    }

    /// Take one token if available
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock();
        *bucket = self.refilled(*bucket, self.clock.now());

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            debug!(tokens = bucket.tokens, "rate limit: insufficient tokens");
            false
        }
    }

    /// Take one token or produce the `RateLimitExceeded` rejection
    pub fn acquire<E>(&self) -> Result<(), ResilienceError<E>>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if self.try_acquire() {
            Ok(())
        } else {
            Err(ResilienceError::RateLimitExceeded {
                requests_per_second: self.config.requests_per_second,
            })
        }
    }

    /// Tokens available right now, including pending refill
    pub fn available_tokens(&self) -> f64 {
        let bucket = *self.bucket.lock();
        self.refilled(bucket, self.clock.now()).tokens
    }

    /// Refill the bucket to capacity
    pub fn reset(&self) {
        let mut bucket = self.bucket.lock();
        *bucket = Bucket { tokens: self.capacity, last_refill: self.clock.now() };
    }
}

impl<C: Clock> Clone for TokenBucket<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            capacity: self.capacity,
            bucket: Arc::clone(&self.bucket),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C: Clock> fmt::Debug for TokenBucket<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBucket")
            .field("requests_per_second", &self.config.requests_per_second)
            .field("capacity", &self.capacity)
            .field("available_tokens", &self.available_tokens())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use super::*;
    use crate::clock::MockClock;

    fn bucket(rps: f64, burst: Option<u32>) -> (TokenBucket<MockClock>, MockClock) {
        let clock = MockClock::new();
        let config = RateLimitConfig { requests_per_second: rps, burst };
        (TokenBucket::with_clock(config, clock.clone()).unwrap(), clock)
    }

    #[test]
    fn test_starts_full_and_drains() {
        let (limiter, _clock) = bucket(1.0, Some(2));

        assert_eq!(limiter.available_tokens(), 2.0);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_refills_over_time() {
        let (limiter, clock) = bucket(1.0, Some(2));
        limiter.try_acquire();
        limiter.try_acquire();

        clock.advance(Duration::from_millis(500));
        assert!(!limiter.try_acquire());

        clock.advance(Duration::from_millis(500));
        assert!(limiter.try_acquire());
    }

    #[test]
    fn test_refill_capped_at_burst() {
        let (limiter, clock) = bucket(10.0, Some(3));
        clock.advance(Duration::from_secs(60));
        assert_eq!(limiter.available_tokens(), 3.0);
    }

    #[test]
    fn test_default_burst_from_rate() {
        let (limiter, _clock) = bucket(4.0, None);
        assert_eq!(limiter.capacity(), 4.0);

        let (slow, _clock) = bucket(0.5, None);
        assert_eq!(slow.capacity(), 1.0);
    }

    #[test]
    fn test_acquire_error_carries_rate() {
        let (limiter, _clock) = bucket(2.0, Some(1));
        assert!(limiter.acquire::<io::Error>().is_ok());

        match limiter.acquire::<io::Error>() {
            Err(ResilienceError::RateLimitExceeded { requests_per_second }) => {
                assert_eq!(requests_per_second, 2.0);
            }
            other => panic!("expected RateLimitExceeded, got {other:?}"),
        }
    }

    #[test]
    fn test_reset_refills() {
        let (limiter, _clock) = bucket(1.0, Some(2));
        limiter.try_acquire();
        limiter.try_acquire();

        limiter.reset();
        assert_eq!(limiter.available_tokens(), 2.0);
    }

    #[test]
    fn test_rejects_invalid_rate() {
        assert!(TokenBucket::new(RateLimitConfig::new(-1.0)).is_err());
    }
}
