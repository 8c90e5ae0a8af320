//! Per-attempt timeout guard with panic containment
//!
//! The guard races one attempt against its deadline. On expiry the attempt
//! future is dropped, which cancels it at its next suspension point, and the
//! attempt's [`CancellationToken`] is cancelled so cooperative work spawned by
//! the operation can stop too. A result produced after the deadline can
//! never be observed because the future producing it no longer exists.
//!
//! Panics raised while creating or polling the attempt are caught here and
//! surface as `ResilienceError::Panicked`.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ResilienceError, ResilienceResult};

/// Deadline applied to one attempt; `None` means no deadline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeoutGuard {
    timeout: Option<Duration>,
}

impl TimeoutGuard {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run one attempt under the deadline
    ///
    /// `operation` is invoked exactly once. `cancel` is cancelled if the
    /// deadline fires.
    pub async fn run<F, Fut, T, E>(&self, operation: F, cancel: &CancellationToken) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let attempt = match std::panic::catch_unwind(AssertUnwindSafe(operation)) {
            Ok(attempt) => attempt,
            Err(payload) => return Err(panicked(payload.as_ref())),
        };
        let guarded = AssertUnwindSafe(attempt).catch_unwind();

        let outcome = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    cancel.cancel();
                    debug!(?timeout, "attempt timed out");
                    return Err(ResilienceError::Timeout { timeout });
                }
            },
            None => guarded.await,
        };

        match outcome {
            Ok(result) => result.map_err(ResilienceError::operation),
            Err(payload) => Err(panicked(payload.as_ref())),
        }
    }
}

/// Run `future` with a deadline, without a cancellation token
pub async fn with_timeout<Fut, T, E>(timeout: Duration, future: Fut) -> ResilienceResult<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    TimeoutGuard::new(Some(timeout)).run(|| future, &CancellationToken::new()).await
}

/// Await `future`, turning a panic into its message
pub(crate) async fn catch_panic<Fut: Future>(future: Fut) -> Result<Fut::Output, String> {
    AssertUnwindSafe(future).catch_unwind().await.map_err(|payload| panic_message(payload.as_ref()))
}

fn panicked<E>(payload: &(dyn Any + Send)) -> ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let message = panic_message(payload);
    warn!(%message, "operation panicked");
    ResilienceError::Panicked { message }
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
