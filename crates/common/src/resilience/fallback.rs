//! Fallback composition

use std::future::Future;

use tracing::debug;

use super::timeout::catch_panic;
use crate::error::{ResilienceError, ResilienceResult};

/// Run `primary`; on any failure run `fallback` instead
///
/// A successful primary is returned untouched and the fallback is never
/// invoked. Otherwise the fallback's outcome becomes the result: its value on
/// success, its own error on failure. The primary's error is discarded. A
/// panicking fallback yields `Panicked`.
pub async fn with_fallback<P, F, Fut, T, E>(primary: P, fallback: F) -> ResilienceResult<T, E>
where
    P: Future<Output = ResilienceResult<T, E>>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    match primary.await {
        Ok(value) => Ok(value),
        Err(error) => {
            debug!(kind = %error.kind(), "primary failed, running fallback");
            run_fallback(fallback).await
        }
    }
}

/// Invoke a fallback operation with panic containment
pub async fn run_fallback<F, Fut, T, E>(fallback: F) -> ResilienceResult<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let future = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(fallback)) {
        Ok(future) => future,
        Err(payload) => {
            return Err(ResilienceError::Panicked {
                message: super::timeout::panic_message(payload.as_ref()),
            })
        }
    };

    match catch_panic(future).await {
        Ok(result) => result.map_err(ResilienceError::operation),
        Err(message) => Err(ResilienceError::Panicked { message }),
    }
}
