//! Resilience error type
//!
//! [`ResilienceError`] is generic over the wrapped operation's error `E`, so
//! the original error survives every layer of the pipeline while rejections
//! and timeouts get their own variants.

use std::fmt;
use std::time::Duration;

use bulwark_domain::ErrorKind;

/// Errors that can occur in resilience operations
///
/// `Display` and `Error` are implemented by hand: `RetryExhausted` nests
/// `Self`, and derived bounds on a recursive generic type never resolve.
#[derive(Debug)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The underlying operation failed
    OperationError { source: E },

    /// The attempt did not finish within its deadline
    Timeout { timeout: Duration },

    /// Circuit breaker is open, rejecting calls
    CircuitOpen,

    /// Bulkhead has no free slot and no free queue position
    BulkheadFull { max_concurrent: usize, max_queue: usize },

    /// Token bucket is empty
    RateLimitExceeded { requests_per_second: f64 },

    /// The retry schedule stopped; `last` is the final attempt's failure
    RetryExhausted { attempts: u32, last: Box<ResilienceError<E>> },

    /// The operation panicked; the panic was contained
    Panicked { message: String },
}

impl<E> fmt::Display for ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperationError { source } => write!(f, "Operation failed: {source}"),
            Self::Timeout { timeout } => write!(f, "Operation timed out after {timeout:?}"),
            Self::CircuitOpen => f.write_str("Circuit breaker is open, rejecting calls"),
            Self::BulkheadFull { max_concurrent, max_queue } => write!(
                f,
                "Bulkhead capacity exceeded: {max_concurrent} concurrent, {max_queue} queued"
            ),
            Self::RateLimitExceeded { requests_per_second } => {
                write!(f, "Rate limit exceeded: {requests_per_second} requests per second")
            }
            Self::RetryExhausted { attempts, last } => {
                write!(f, "Retries exhausted after {attempts} attempts: {last}")
            }
            Self::Panicked { message } => write!(f, "Operation panicked: {message}"),
        }
    }
}

impl<E> std::error::Error for ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::OperationError { source } => Some(source),
            Self::RetryExhausted { last, .. } => Some(last.as_ref()),
            _ => None,
        }
    }
}

/// Result type for resilience operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

impl<E> ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Wrap an operation error
    pub fn operation(source: E) -> Self {
        Self::OperationError { source }
    }

    /// Classification used by telemetry and health counters
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OperationError { .. } => ErrorKind::Operation,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::CircuitOpen => ErrorKind::CircuitOpen,
            Self::BulkheadFull { .. } => ErrorKind::BulkheadFull,
            Self::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
            Self::RetryExhausted { .. } => ErrorKind::RetryExhausted,
            Self::Panicked { .. } => ErrorKind::Panicked,
        }
    }

    /// Whether another attempt may succeed where this one failed
    ///
    /// Operation errors, timeouts and panics are retryable. Rejections and
    /// an already exhausted retry are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::OperationError { .. } | Self::Timeout { .. } | Self::Panicked { .. })
    }

    /// Whether the call was refused without running the operation
    pub fn is_rejection(&self) -> bool {
        self.kind().is_rejection()
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The innermost failure, looking through `RetryExhausted`
    pub fn last_failure(&self) -> &Self {
        match self {
            Self::RetryExhausted { last, .. } => last.last_failure(),
            other => other,
        }
    }

    /// The wrapped operation error, if the innermost failure carries one
    pub fn operation_error(&self) -> Option<&E> {
        match self.last_failure() {
            Self::OperationError { source } => Some(source),
            _ => None,
        }
    }

    /// Consume the error and return the wrapped operation error, if any
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::OperationError { source } => Some(source),
            Self::RetryExhausted { last, .. } => last.into_operation_error(),
            _ => None,
        }
    }

    /// Number of attempts the failure represents
    pub fn attempts(&self) -> u32 {
        match self {
            Self::RetryExhausted { attempts, .. } => *attempts,
            _ if self.is_rejection() => 0,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;
    use std::fmt;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Boom(&'static str);

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom: {}", self.0)
        }
    }

    impl std::error::Error for Boom {}

    /// Validates kind classification of every variant.
    ///
    /// Assertions:
    /// - Confirms each variant maps to its `ErrorKind`.
    #[test]
    fn test_error_kinds() {
        let op: ResilienceError<Boom> = ResilienceError::operation(Boom("x"));
        assert_eq!(op.kind(), ErrorKind::Operation);
        assert_eq!(
            ResilienceError::<Boom>::Timeout { timeout: Duration::from_millis(5) }.kind(),
            ErrorKind::Timeout
        );
        assert_eq!(ResilienceError::<Boom>::CircuitOpen.kind(), ErrorKind::CircuitOpen);
        assert_eq!(
            ResilienceError::<Boom>::Panicked { message: "p".into() }.kind(),
            ErrorKind::Panicked
        );
    }

    /// Validates the retryable and rejection predicates.
    ///
    /// Assertions:
    /// - Ensures operation errors, timeouts and panics are retryable.
    /// - Ensures rejections are not retryable.
    #[test]
    fn test_retryable_and_rejection() {
        assert!(ResilienceError::operation(Boom("x")).is_retryable());
        assert!(ResilienceError::<Boom>::Timeout { timeout: Duration::ZERO }.is_retryable());
        assert!(ResilienceError::<Boom>::Panicked { message: String::new() }.is_retryable());

        let full = ResilienceError::<Boom>::BulkheadFull { max_concurrent: 2, max_queue: 0 };
        assert!(!full.is_retryable());
        assert!(full.is_rejection());
        assert!(ResilienceError::<Boom>::RateLimitExceeded { requests_per_second: 1.0 }
            .is_rejection());
        assert!(!ResilienceError::<Boom>::CircuitOpen.is_retryable());
    }

    /// Validates `RetryExhausted` wraps and exposes the last failure.
    ///
    /// Assertions:
    /// - Confirms `operation_error()` looks through the wrapper.
    /// - Confirms the error source chain reaches the last failure.
    #[test]
    fn test_retry_exhausted_exposes_last() {
        let err = ResilienceError::RetryExhausted {
            attempts: 3,
            last: Box::new(ResilienceError::operation(Boom("third"))),
        };

        assert_eq!(err.attempts(), 3);
        assert!(!err.is_retryable());
        assert_eq!(err.operation_error(), Some(&Boom("third")));
        assert_eq!(err.last_failure().kind(), ErrorKind::Operation);
        let source = err.source().expect("source chain");
        assert_eq!(source.to_string(), "Operation failed: boom: third");
        assert!(source.source().is_some());
        assert!(err.to_string().contains("boom: third"));
        assert_eq!(err.into_operation_error(), Some(Boom("third")));
    }

    /// Validates display messages.
    ///
    /// Assertions:
    /// - Confirms the bulkhead message names both bounds.
    #[test]
    fn test_display() {
        let err = ResilienceError::<Boom>::BulkheadFull { max_concurrent: 2, max_queue: 1 };
        assert_eq!(err.to_string(), "Bulkhead capacity exceeded: 2 concurrent, 1 queued");

        let exhausted = ResilienceError::RetryExhausted {
            attempts: 2,
            last: Box::new(ResilienceError::<Boom>::Timeout { timeout: Duration::from_millis(5) }),
        };
        assert_eq!(exhausted.to_string(), "Retries exhausted after 2 attempts: Operation timed out after 5ms");
        assert!(exhausted.source().is_some_and(|s| s.source().is_none()));
    }

    /// Validates the error is usable behind `dyn Error` in generic code.
    ///
    /// Assertions:
    /// - Confirms `ResilienceError` boxes into `Box<dyn Error + Send + Sync>`.
    #[test]
    fn test_boxes_as_dyn_error() {
        fn boxed<E: std::error::Error + Send + Sync + 'static>(
            err: ResilienceError<E>,
        ) -> Box<dyn std::error::Error + Send + Sync> {
            Box::new(err)
        }

        let err = boxed(ResilienceError::<Boom>::CircuitOpen);
        assert_eq!(err.to_string(), "Circuit breaker is open, rejecting calls");
    }
}
