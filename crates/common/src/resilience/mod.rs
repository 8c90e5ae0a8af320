//! Resilience primitives for fault tolerance
//!
//! This module provides **generic, reusable** building blocks:
//! - **Circuit Breaker**: stops calling a failing dependency for a while
//! - **Bulkhead**: bounds concurrency with a bounded FIFO wait queue
//! - **Token Bucket**: bounds call rate, rejecting instead of queueing
//! - **Retry Policy**: follows a declarative [`bulwark_domain::RetrySchedule`]
//! - **Timeout Guard**: per-attempt deadline with panic containment
//! - **Fallback**: substitutes an alternative outcome on failure
//!
//! Every primitive is generic over the wrapped operation's error type and
//! reports failures as [`crate::ResilienceError`]. Time-dependent primitives
//! take a [`crate::Clock`] so tests can use [`crate::MockClock`].
//!
//! The primitives do not know about each other. `bulwark-core` composes them
//! into a pipeline in a fixed order.

pub mod bulkhead;
pub mod circuit_breaker;
pub mod fallback;
pub mod rate_limiter;
pub mod retry;
pub mod timeout;

pub use bulkhead::{Bulkhead, BulkheadPermit};
pub use circuit_breaker::{CircuitBreaker, CircuitPermit};
pub use fallback::{run_fallback, with_fallback};
pub use rate_limiter::TokenBucket;
pub use retry::{apply_jitter, RetryDecision, RetryPolicy};
pub use timeout::{panic_message, with_timeout, TimeoutGuard};
