//! Resilience configuration
//!
//! [`ResilienceConfig`] describes which strategies protect one operation
//! class. Every strategy is optional; `None` disables it. Values are
//! immutable once built: the `with_*` methods consume the config and return
//! an updated copy.
//!
//! All durations are (de)serialised as milliseconds.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_FACTOR, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_CONCURRENT, DEFAULT_MAX_QUEUE, DEFAULT_OPEN_DURATION_MS,
    DEFAULT_SUCCESS_THRESHOLD,
};
use crate::errors::{ConfigError, ConfigResult};
use crate::schedule::{Jitter, RetrySchedule};
use crate::serde_utils::{duration_millis, option_duration_millis};

/* -------------------------------------------------------------------------- */
/* Top-level configuration */
/* -------------------------------------------------------------------------- */

/// Strategies applied to one operation class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResilienceConfig {
    /// Per-attempt deadline
    #[serde(with = "option_duration_millis", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bulkhead: Option<BulkheadConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitConfig>,
}

impl ResilienceConfig {
    /// Configuration with every strategy disabled
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(circuit_breaker);
        self
    }

    pub fn with_bulkhead(mut self, bulkhead: BulkheadConfig) -> Self {
        self.bulkhead = Some(bulkhead);
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    /// True when no strategy is enabled
    pub fn is_passthrough(&self) -> bool {
        self.timeout.is_none()
            && self.retry.is_none()
            && self.circuit_breaker.is_none()
            && self.bulkhead.is_none()
            && self.rate_limit.is_none()
    }

    /// Validate every enabled strategy
    pub fn validate(&self) -> ConfigResult<()> {
        if self.timeout == Some(Duration::ZERO) {
            return Err(ConfigError::invalid("timeout", "timeout must be greater than 0"));
        }
        if let Some(retry) = &self.retry {
            retry.validate()?;
        }
        if let Some(breaker) = &self.circuit_breaker {
            breaker.validate()?;
        }
        if let Some(bulkhead) = &self.bulkhead {
            bulkhead.validate()?;
        }
        if let Some(rate_limit) = &self.rate_limit {
            rate_limit.validate()?;
        }
        Ok(())
    }
}

/* -------------------------------------------------------------------------- */
/* Retry */
/* -------------------------------------------------------------------------- */

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total number of attempts, including the first
    pub max_attempts: u32,
    /// Delay policy between attempts
    pub backoff: RetrySchedule,
    pub jitter: Jitter,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: RetrySchedule::exponential(
                Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
                DEFAULT_BACKOFF_FACTOR,
            ),
            jitter: Jitter::None,
        }
    }
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Schedule the executor actually follows
    ///
    /// `max_attempts` bounds the total number of attempts, so the attempt
    /// count is intersected with the configured backoff.
    pub fn effective_schedule(&self) -> RetrySchedule {
        RetrySchedule::recurs(self.max_attempts.saturating_sub(1)).and(self.backoff.clone())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid(
                "retry.max_attempts",
                "max_attempts must be greater than 0",
            ));
        }
        self.backoff.validate()
    }
}

/// Builder for [`RetryConfig`]
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn backoff(mut self, backoff: RetrySchedule) -> Self {
        self.config.backoff = backoff;
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn build(self) -> ConfigResult<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/* -------------------------------------------------------------------------- */
/* Circuit breaker */
/* -------------------------------------------------------------------------- */

/// Circuit breaker thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open a closed circuit
    pub failure_threshold: u32,
    /// Consecutive probe successes that close a half-open circuit
    pub success_threshold: u32,
    /// How long the circuit stays open before admitting a probe
    #[serde(with = "duration_millis")]
    pub open_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            open_duration: Duration::from_millis(DEFAULT_OPEN_DURATION_MS),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid(
                "circuit_breaker.failure_threshold",
                "failure_threshold must be greater than 0",
            ));
        }
        if self.success_threshold == 0 {
            return Err(ConfigError::invalid(
                "circuit_breaker.success_threshold",
                "success_threshold must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Builder for [`CircuitBreakerConfig`]
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    pub fn open_duration(mut self, duration: Duration) -> Self {
        self.config.open_duration = duration;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/* -------------------------------------------------------------------------- */
/* Bulkhead */
/* -------------------------------------------------------------------------- */

/// Concurrency bound for one operation class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BulkheadConfig {
    /// Maximum number of calls executing at once
    pub max_concurrent: usize,
    /// Maximum number of calls waiting for a slot
    pub max_queue: usize,
    /// Longest a queued call may wait before it is rejected
    #[serde(with = "option_duration_millis", skip_serializing_if = "Option::is_none")]
    pub max_wait: Option<Duration>,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self { max_concurrent: DEFAULT_MAX_CONCURRENT, max_queue: DEFAULT_MAX_QUEUE, max_wait: None }
    }
}

impl BulkheadConfig {
    pub fn new(max_concurrent: usize, max_queue: usize) -> Self {
        Self { max_concurrent, max_queue, max_wait: None }
    }

    pub fn builder() -> BulkheadConfigBuilder {
        BulkheadConfigBuilder::new()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::invalid(
                "bulkhead.max_concurrent",
                "max_concurrent must be greater than 0",
            ));
        }
        if self.max_wait == Some(Duration::ZERO) {
            return Err(ConfigError::invalid(
                "bulkhead.max_wait",
                "max_wait must be greater than 0 when set",
            ));
        }
        Ok(())
    }
}

/// Builder for [`BulkheadConfig`]
#[derive(Debug, Default)]
pub struct BulkheadConfigBuilder {
    config: BulkheadConfig,
}

impl BulkheadConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.config.max_concurrent = max;
        self
    }

    pub fn max_queue(mut self, max: usize) -> Self {
        self.config.max_queue = max;
        self
    }

    pub fn max_wait(mut self, wait: Duration) -> Self {
        self.config.max_wait = Some(wait);
        self
    }

    pub fn build(self) -> ConfigResult<BulkheadConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/* -------------------------------------------------------------------------- */
/* Rate limit */
/* -------------------------------------------------------------------------- */

/// Token bucket parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Sustained refill rate
    pub requests_per_second: f64,
    /// Bucket capacity; defaults to `max(1, ceil(requests_per_second))`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst: Option<u32>,
}

impl RateLimitConfig {
    pub fn new(requests_per_second: f64) -> Self {
        Self { requests_per_second, burst: None }
    }

    pub fn with_burst(mut self, burst: u32) -> Self {
        self.burst = Some(burst);
        self
    }

    /// Bucket capacity actually used
    pub fn effective_burst(&self) -> u32 {
        self.burst.unwrap_or_else(|| {
            let ceil = self.requests_per_second.ceil();
            if ceil >= f64::from(u32::MAX) {
                u32::MAX
            } else {
                (ceil as u32).max(1)
            }
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !self.requests_per_second.is_finite() || self.requests_per_second <= 0.0 {
            return Err(ConfigError::invalid(
                "rate_limit.requests_per_second",
                format!(
                    "requests_per_second must be a positive finite number, got {}",
                    self.requests_per_second
                ),
            ));
        }
        if self.burst == Some(0) {
            return Err(ConfigError::invalid(
                "rate_limit.burst",
                "burst must be greater than 0 when set",
            ));
        }
        Ok(())
    }
}

/* -------------------------------------------------------------------------- */
/* Settings for many operation classes */
/* -------------------------------------------------------------------------- */

/// Configurations keyed by operation class
///
/// ```toml
/// [default]
/// timeout = 2000
///
/// [classes.payments]
/// timeout = 500
///
/// [classes.payments.circuit_breaker]
/// failure_threshold = 3
/// success_threshold = 2
/// open_duration = 1000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    /// Applied to classes without their own entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<ResilienceConfig>,
    pub classes: BTreeMap<String, ResilienceConfig>,
}

impl EngineSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, config: ResilienceConfig) -> Self {
        self.default = Some(config);
        self
    }

    pub fn with_class(mut self, class: impl Into<String>, config: ResilienceConfig) -> Self {
        self.classes.insert(class.into(), config);
        self
    }

    /// Configuration for `class`, falling back to the default entry
    pub fn config_for(&self, class: &str) -> Option<&ResilienceConfig> {
        self.classes.get(class).or(self.default.as_ref())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(default) = &self.default {
            default.validate().map_err(|e| ConfigError::in_class("default", e))?;
        }
        for (class, config) in &self.classes {
            config.validate().map_err(|e| ConfigError::in_class(class, e))?;
        }
        Ok(())
    }
}
