//! Engine constants
//!
//! Defaults applied when a sub-config is built without explicit values.

// Circuit breaker defaults
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 2;
pub const DEFAULT_OPEN_DURATION_MS: u64 = 30_000;

// Retry defaults
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 100;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;

// Bulkhead defaults
pub const DEFAULT_MAX_CONCURRENT: usize = 10;
pub const DEFAULT_MAX_QUEUE: usize = 10;

/// Health score reported before any request has been observed
pub const OPTIMISTIC_HEALTH_SCORE: f64 = 100.0;

/// Operation class used when an engine is created without a name
pub const DEFAULT_OPERATION_CLASS: &str = "default";
