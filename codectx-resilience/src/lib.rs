//! Resilience kernel: circuit breaker, retry, bounded worker pool,
//! map-reduce, and a resilient external-service client (spec §4.1).

pub mod breaker;
pub mod client;
pub mod error;
pub mod map_reduce;
pub mod pool;
pub mod prelude;
pub mod retry;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerManager, CircuitBreakerStats};
pub use client::{DegradationHandler, ResilientClient, ResilientClientConfig};
pub use error::{ResilienceError, Result};
pub use map_reduce::{map_reduce, MapReduceOutcome};
pub use pool::{BatchResult, Semaphore, WorkOutcome, WorkResult, WorkerPool, WorkerPoolConfig};
pub use retry::{
    calculate_delay, retry, retry_with_circuit_breaker, BackoffStrategy, JitterStrategy,
    RetryConfig, RetryMetrics, RetryMetricsSnapshot, RetryReport, Retryable,
};
