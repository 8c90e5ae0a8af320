//! Bulkhead pattern for limiting concurrent operations
//!
//! At most `max_concurrent` calls hold a slot at once. Up to `max_queue`
//! further callers wait in FIFO order for a slot; anyone beyond that is
//! rejected immediately with `BulkheadFull`. Slots are RAII permits, so a
//! slot is released on every exit path including cancellation.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bulwark_domain::{BulkheadConfig, BulkheadSnapshot, ConfigError, ConfigResult};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument, warn};

use crate::error::{ResilienceError, ResilienceResult};

/// Bulkhead for limiting concurrent operations
///
/// # Examples
///
/// ```rust
/// use bulwark_common::resilience::Bulkhead;
/// use bulwark_domain::BulkheadConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bulkhead = Bulkhead::new(BulkheadConfig::new(5, 10))?;
///
/// let value = bulkhead.execute(|| async { Ok::<_, std::io::Error>("done") }).await?;
/// assert_eq!(value, "done");
/// # Ok(())
/// # }
/// ```
pub struct Bulkhead {
    config: BulkheadConfig,
    semaphore: Arc<Semaphore>,
    queued: Arc<AtomicUsize>,
    rejected: Arc<AtomicU64>,
}

impl Bulkhead {
    /// Create a new bulkhead with the given configuration
    ///
    /// Fails if the configuration is invalid or `max_concurrent` exceeds
    /// [`Semaphore::MAX_PERMITS`].
    pub fn new(config: BulkheadConfig) -> ConfigResult<Self> {
        config.validate()?;
        if config.max_concurrent > Semaphore::MAX_PERMITS {
            return Err(ConfigError::invalid(
                "bulkhead.max_concurrent",
                format!(
                    "max_concurrent must be at most {}, got {}",
                    Semaphore::MAX_PERMITS,
                    config.max_concurrent
                ),
            ));
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            queued: Arc::new(AtomicUsize::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
            config,
        })
    }

    pub fn config(&self) -> &BulkheadConfig {
        &self.config
    }

    /// Acquire a slot, queueing if allowed
    ///
    /// Resolves immediately with a permit when a slot is free, immediately
    /// with `BulkheadFull` when the queue is full, and otherwise once a slot
    /// frees up. With `max_wait` set, a queued caller that waits longer is
    /// rejected. Dropping the returned future leaves the queue.
    pub async fn acquire<E>(&self) -> ResilienceResult<BulkheadPermit, E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() {
            return Ok(BulkheadPermit { _permit: permit });
        }

        let reserved = self.queued.fetch_update(Ordering::AcqRel, Ordering::Acquire, |queued| {
            (queued < self.config.max_queue).then_some(queued + 1)
        });
        if reserved.is_err() {
            return Err(self.reject());
        }

        let _slot = QueueSlot(self.queued.as_ref());
        debug!(queued = self.queued(), "bulkhead full, waiting for a slot");

        let acquire = Arc::clone(&self.semaphore).acquire_owned();
        let acquired = match self.config.max_wait {
            Some(max_wait) => match tokio::time::timeout(max_wait, acquire).await {
                Ok(acquired) => acquired,
                Err(_) => {
                    warn!(?max_wait, "bulkhead queue wait exceeded");
                    return Err(self.reject());
                }
            },
            None => acquire.await,
        };

        // The semaphore is never closed, so an error here means the bulkhead
        // is being torn down; treat it as full.
        acquired.map(|permit| BulkheadPermit { _permit: permit }).map_err(|_| self.reject())
    }

    /// Execute an operation with bulkhead protection
    #[instrument(skip(self, operation), fields(in_flight = self.in_flight()))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let _permit = self.acquire::<E>().await?;
        operation().await.map_err(ResilienceError::operation)
    }

    /// Number of calls currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.config.max_concurrent.saturating_sub(self.semaphore.available_permits())
    }

    /// Number of calls waiting for a slot
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> BulkheadSnapshot {
        BulkheadSnapshot {
            in_flight: self.in_flight(),
            queued: self.queued(),
            max_concurrent: self.config.max_concurrent,
            max_queue: self.config.max_queue,
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    fn reject<E>(&self) -> ResilienceError<E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        debug!(
            max_concurrent = self.config.max_concurrent,
            max_queue = self.config.max_queue,
            "bulkhead rejected call"
        );
        ResilienceError::BulkheadFull {
            max_concurrent: self.config.max_concurrent,
            max_queue: self.config.max_queue,
        }
    }
}

impl Clone for Bulkhead {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            semaphore: Arc::clone(&self.semaphore),
            queued: Arc::clone(&self.queued),
            rejected: Arc::clone(&self.rejected),
        }
    }
}

impl fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bulkhead")
            .field("max_concurrent", &self.config.max_concurrent)
            .field("max_queue", &self.config.max_queue)
            .field("in_flight", &self.in_flight())
            .field("queued", &self.queued())
            .finish()
    }
}

/// A held bulkhead slot; dropping it admits the next waiter
#[derive(Debug)]
pub struct BulkheadPermit {
    _permit: OwnedSemaphorePermit,
}

impl BulkheadPermit {
    /// Release the slot explicitly
    pub fn release(self) {}
}

/// Queue position; released when the waiter leaves the queue for any reason
struct QueueSlot<'a>(&'a AtomicUsize);

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use super::*;

    fn bulkhead(max_concurrent: usize, max_queue: usize) -> Arc<Bulkhead> {
        Arc::new(Bulkhead::new(BulkheadConfig::new(max_concurrent, max_queue)).unwrap())
    }

    #[tokio::test]
    async fn test_bulkhead_basic() {
        let bulkhead = bulkhead(2, 1);

        let result = bulkhead.execute(|| async { Ok::<_, io::Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(bulkhead.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_rejects_beyond_queue() {
        let bulkhead = bulkhead(1, 1);

        let held = bulkhead.acquire::<io::Error>().await.unwrap();
        let waiter = {
            let bulkhead = Arc::clone(&bulkhead);
            tokio::spawn(async move { bulkhead.acquire::<io::Error>().await.map(|_| ()) })
        };
        tokio::task::yield_now().await;
        while bulkhead.queued() == 0 {
            tokio::task::yield_now().await;
        }

        let rejected = bulkhead.acquire::<io::Error>().await;
        assert!(matches!(
            rejected,
            Err(ResilienceError::BulkheadFull { max_concurrent: 1, max_queue: 1 })
        ));
        assert_eq!(bulkhead.snapshot().rejected, 1);

        held.release();
        waiter.await.unwrap().unwrap();
        assert_eq!(bulkhead.queued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_wait_rejects_queued_caller() {
        let config = BulkheadConfig::builder()
            .max_concurrent(1)
            .max_queue(1)
            .max_wait(Duration::from_millis(50))
            .build()
            .unwrap();
        let bulkhead = Bulkhead::new(config).unwrap();

        let _held = bulkhead.acquire::<io::Error>().await.unwrap();
        let waited = bulkhead.acquire::<io::Error>().await;

        assert!(matches!(waited, Err(ResilienceError::BulkheadFull { .. })));
        assert_eq!(bulkhead.queued(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_leaves_queue() {
        let bulkhead = bulkhead(1, 1);
        let _held = bulkhead.acquire::<io::Error>().await.unwrap();

        let attempt = tokio::time::timeout(Duration::from_millis(10), bulkhead.acquire::<io::Error>());
        assert!(attempt.await.is_err());
        assert_eq!(bulkhead.queued(), 0);
    }

    #[tokio::test]
    async fn test_waiters_admitted_in_fifo_order() {
        let bulkhead = bulkhead(1, 3);
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let held = bulkhead.acquire::<io::Error>().await.unwrap();

        let mut handles = Vec::new();
        for id in 0..3 {
            let inner = Arc::clone(&bulkhead);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let _permit = inner.acquire::<io::Error>().await.unwrap();
                order.lock().push(id);
            }));
            while bulkhead.queued() <= id {
                tokio::task::yield_now().await;
            }
        }

        drop(held);
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    /// Validates oversized concurrency bounds are rejected, not panicked on.
    ///
    /// Assertions:
    /// - Ensures `usize::MAX` yields a `ConfigError` naming the field.
    /// - Ensures exactly `Semaphore::MAX_PERMITS` is still accepted.
    #[test]
    fn test_rejects_concurrency_above_semaphore_limit() {
        let err = Bulkhead::new(BulkheadConfig::new(usize::MAX, 0)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "bulkhead.max_concurrent", .. }));

        assert!(Bulkhead::new(BulkheadConfig::new(Semaphore::MAX_PERMITS, 0)).is_ok());
    }

    #[tokio::test]
    async fn test_snapshot_counts_in_flight() {
        let bulkhead = bulkhead(3, 0);
        let first = bulkhead.acquire::<io::Error>().await.unwrap();
        let _second = bulkhead.acquire::<io::Error>().await.unwrap();

        let snapshot = bulkhead.snapshot();
        assert_eq!(snapshot.in_flight, 2);
        assert_eq!(snapshot.available(), 1);

        drop(first);
        assert_eq!(bulkhead.in_flight(), 1);
    }
}
