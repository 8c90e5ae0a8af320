//! Generic resilience primitives shared across Bulwark crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - (always) clock abstraction, [`ResilienceError`], [`ExecutionResult`]
//! - `runtime`: async primitives (circuit breaker, bulkhead, token bucket,
//!   retry policy, timeout guard, fallback)
//! - `test-utils`: helpers for exercising the primitives in tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
pub mod clock;
pub mod error;
pub mod result;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use clock::{Clock, MockClock, SystemClock};
pub use error::{ResilienceError, ResilienceResult};
#[cfg(feature = "runtime")]
pub use resilience::{
    with_fallback, Bulkhead, BulkheadPermit, CircuitBreaker, CircuitPermit, RetryDecision, RetryPolicy,
    TimeoutGuard, TokenBucket,
};
pub use result::ExecutionResult;
