//! Convenience re-exports for downstream crates.

pub use crate::breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerManager};
pub use crate::client::{DegradationHandler, ResilientClient, ResilientClientConfig};
pub use crate::error::{ResilienceError, Result};
pub use crate::map_reduce::{map_reduce, MapReduceOutcome};
pub use crate::pool::{WorkOutcome, WorkerPool, WorkerPoolConfig};
pub use crate::retry::{retry, retry_with_circuit_breaker, RetryConfig, Retryable};
