//! Uniform call outcome

use crate::error::{ResilienceError, ResilienceResult};

/// Outcome of a protected call
///
/// An engine never panics and never returns a bare `Result`; every path ends
/// in one of these two variants.
#[must_use]
#[derive(Debug)]
pub enum ExecutionResult<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    Success(T),
    Failure(ResilienceError<E>),
}

impl<T, E> ExecutionResult<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ResilienceError<E>> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }

    pub fn into_result(self) -> ResilienceResult<T, E> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(error) => Err(error),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ExecutionResult<U, E> {
        match self {
            Self::Success(value) => ExecutionResult::Success(f(value)),
            Self::Failure(error) => ExecutionResult::Failure(error),
        }
    }
}

impl<T, E> From<ResilienceResult<T, E>> for ExecutionResult<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(result: ResilienceResult<T, E>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(error) => Self::Failure(error),
        }
    }
}

impl<T, E> From<ExecutionResult<T, E>> for ResilienceResult<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(result: ExecutionResult<T, E>) -> Self {
        result.into_result()
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn test_success_accessors() {
        let result: ExecutionResult<u32, io::Error> = ExecutionResult::Success(7);
        assert!(result.is_success());
        assert_eq!(result.value(), Some(&7));
        assert!(result.error().is_none());
        assert_eq!(result.map(|v| v * 2).into_result().ok(), Some(14));
    }

    #[test]
    fn test_failure_from_result() {
        let raw: ResilienceResult<u32, io::Error> = Err(ResilienceError::CircuitOpen);
        let result = ExecutionResult::from(raw);
        assert!(result.is_failure());
        assert!(matches!(result.error(), Some(ResilienceError::CircuitOpen)));
    }
}
