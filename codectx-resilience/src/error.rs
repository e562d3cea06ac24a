//! Error types for the resilience kernel.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResilienceError>;

#[derive(Debug, Error)]
pub enum ResilienceError {
    /// The circuit is open; the call was rejected without being attempted.
    #[error("circuit is open")]
    CircuitOpen,

    /// All retry attempts were exhausted without success.
    #[error("retry exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted {
        attempts: u32,
        last_error: String,
    },

    /// The calling context was cancelled before the operation completed.
    #[error("operation was cancelled")]
    Cancelled,

    /// A semaphore permit was released without a matching acquire.
    #[error("semaphore released without a matching acquire")]
    UnbalancedRelease,

    /// The startup health check failed and `allow_start_degraded` was false.
    #[error("service unhealthy at startup: {0}")]
    UnhealthyAtStartup(String),

    /// The wrapped operation itself failed (non-retryable, or retries exhausted).
    #[error("operation failed: {0}")]
    Inner(String),
}

impl From<codectx_core::CoreError> for ResilienceError {
    fn from(e: codectx_core::CoreError) -> Self {
        match e {
            codectx_core::CoreError::CircuitOpen => Self::CircuitOpen,
            codectx_core::CoreError::Cancelled => Self::Cancelled,
            codectx_core::CoreError::UnbalancedRelease => Self::UnbalancedRelease,
            other => Self::Inner(other.to_string()),
        }
    }
}
