//! Cross-module resilience scenarios: breaker + retry + worker pool
//! composed the way a real caller would use them together.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use codectx_resilience::{
    map_reduce, retry_with_circuit_breaker, CircuitBreaker, CircuitBreakerConfig, ResilienceError,
    RetryConfig, Retryable, WorkerPool, WorkerPoolConfig,
};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct FlakyError(&'static str);

impl std::fmt::Display for FlakyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Retryable for FlakyError {
    fn is_retryable(&self) -> bool {
        true
    }
}

#[tokio::test]
async fn breaker_opens_then_retry_sees_circuit_open_without_calling_fn() {
    let breaker = CircuitBreaker::with_config(
        "downstream",
        CircuitBreakerConfig {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(60),
            ..Default::default()
        },
    );
    let cancel = CancellationToken::new();
    let calls = Arc::new(AtomicU32::new(0));

    for _ in 0..3 {
        let calls = calls.clone();
        let _ = retry_with_circuit_breaker(
            &RetryConfig {
                max_attempts: 1,
                ..Default::default()
            },
            &breaker,
            &cancel,
            move |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(FlakyError("downstream unavailable")) }
            },
        )
        .await;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let calls_after_open = calls.clone();
    let result = retry_with_circuit_breaker(
        &RetryConfig::default(),
        &breaker,
        &cancel,
        move |_attempt| {
            calls_after_open.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, FlakyError>(()) }
        },
    )
    .await;

    assert!(matches!(result, Err(ResilienceError::CircuitOpen)));
    // The rejected call never reached the wrapped function.
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn worker_pool_bounds_concurrency_across_map_reduce() {
    let pool = WorkerPool::new(WorkerPoolConfig {
        capacity: 2,
        per_entity_timeout: Duration::from_secs(2),
        total_timeout: Duration::from_secs(10),
    });
    let in_flight = Arc::new(AtomicU32::new(0));
    let max_observed = Arc::new(AtomicU32::new(0));

    let items: Vec<u32> = (0..8).collect();
    let in_flight_cb = in_flight.clone();
    let max_cb = max_observed.clone();
    let outcome = map_reduce(&pool, CancellationToken::new(), items, move |_idx, item| {
        let in_flight = in_flight_cb.clone();
        let max_observed = max_cb.clone();
        async move {
            let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_observed.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, String>(item * 10)
        }
    })
    .await;

    assert!(outcome.error.is_none());
    assert_eq!(
        outcome.results,
        (0..8).map(|i| Some(i * 10)).collect::<Vec<_>>()
    );
    assert!(max_observed.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn circuit_reopens_on_failure_after_half_open_probe_fails() {
    let breaker = CircuitBreaker::with_config(
        "flaky-store",
        CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: Duration::from_millis(20),
            half_open_max_requests: 1,
            success_threshold: 1,
            ..Default::default()
        },
    );
    breaker.record_failure();
    assert!(!breaker.allow());

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(breaker.allow());
    breaker.record_failure();
    assert!(!breaker.allow());
}
