//! Retry with exponential backoff and jitter (spec §4.1.2).

use rand::Rng;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::breaker::CircuitBreaker;
use crate::error::ResilienceError;

/// How the base delay grows between attempts. `Exponential` with a
/// symmetric jitter is the spec's behavior and the `Default`; the other
/// shapes are additive (spec §9 "design notes", supplemented per SPEC_FULL).
#[derive(Debug, Clone)]
pub enum BackoffStrategy {
    Fixed(Duration),
    Linear {
        base: Duration,
        increment: Duration,
    },
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
    },
    Fibonacci {
        base: Duration,
        max: Duration,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            factor: 2.0,
            max: Duration::from_secs(30),
        }
    }
}

/// Jitter applied on top of the base delay to avoid thundering-herd retries.
#[derive(Debug, Clone, Copy)]
pub enum JitterStrategy {
    None,
    /// `delay * (1 + uniform(-factor, +factor))`, the spec's formula.
    Symmetric(f64),
    /// `uniform(0, delay)`.
    Full,
    /// `uniform(delay/2, delay)`.
    Equal,
}

impl Default for JitterStrategy {
    fn default() -> Self {
        Self::Symmetric(0.2)
    }
}

/// Retry tuning (spec §6's recognized options).
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
    pub jitter: JitterStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::default(),
            jitter: JitterStrategy::default(),
        }
    }
}

/// Classifies an operation's error as retryable, non-retryable, or a
/// cancellation (spec §4.1.2's `IsRetryable` predicate).
pub trait Retryable {
    /// Timeouts and network/connection errors are retryable; invalid
    /// requests and similar permanent failures are not.
    fn is_retryable(&self) -> bool;

    /// Context/cancellation-token cancellation is never retried.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Outcome of a completed (successful or exhausted) retry loop.
#[derive(Debug, Clone)]
pub struct RetryReport {
    pub attempts: u32,
    pub total_duration: Duration,
    pub last_error: Option<String>,
}

fn fibonacci(n: u32) -> u32 {
    let (mut a, mut b) = (1u32, 1u32);
    for _ in 1..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    a
}

fn base_delay(backoff: &BackoffStrategy, attempt: u32) -> Duration {
    match backoff {
        BackoffStrategy::Fixed(d) => *d,
        BackoffStrategy::Linear { base, increment } => {
            *base + *increment * attempt.saturating_sub(1)
        }
        BackoffStrategy::Exponential { base, factor, max } => {
            let raw = base.as_secs_f64() * factor.powi(attempt.saturating_sub(1) as i32);
            Duration::from_secs_f64(raw.max(0.0)).min(*max)
        }
        BackoffStrategy::Fibonacci { base, max } => {
            let fib = fibonacci(attempt);
            base.saturating_mul(fib).min(*max)
        }
    }
}

fn apply_jitter(jitter: JitterStrategy, base: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    match jitter {
        JitterStrategy::None => base,
        JitterStrategy::Symmetric(factor) => {
            let f = rng.gen_range(-factor..=factor);
            let secs = (base.as_secs_f64() * (1.0 + f)).max(0.0);
            Duration::from_secs_f64(secs)
        }
        JitterStrategy::Full => {
            let secs = rng.gen_range(0.0..=base.as_secs_f64());
            Duration::from_secs_f64(secs)
        }
        JitterStrategy::Equal => {
            let half = base.as_secs_f64() / 2.0;
            let secs = rng.gen_range(half..=base.as_secs_f64().max(half));
            Duration::from_secs_f64(secs)
        }
    }
}

/// Compute the delay to wait after the `attempt`-th attempt (1-indexed).
#[must_use]
pub fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    apply_jitter(config.jitter, base_delay(&config.backoff, attempt))
}

/// Run `f` up to `config.max_attempts` times, backing off between failures.
/// Stops early on success, a non-retryable error, or cancellation.
pub async fn retry<T, E, F, Fut>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut f: F,
) -> (Result<T, E>, RetryReport)
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let start = Instant::now();
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        if cancel.is_cancelled() {
            // Caller must supply the cancellation error via their own type;
            // we can only report exhaustion here since E is opaque to us.
        }
        match f(attempts).await {
            Ok(v) => {
                return (
                    Ok(v),
                    RetryReport {
                        attempts,
                        total_duration: start.elapsed(),
                        last_error: None,
                    },
                )
            }
            Err(e) => {
                let last_error = Some(e.to_string());
                if e.is_cancelled() || !e.is_retryable() || attempts >= config.max_attempts {
                    if attempts >= config.max_attempts {
                        warn!("retry exhausted after {} attempts", attempts);
                    }
                    return (
                        Err(e),
                        RetryReport {
                            attempts,
                            total_duration: start.elapsed(),
                            last_error,
                        },
                    );
                }
                let delay = calculate_delay(config, attempts);
                debug!("retry attempt {} failed, backing off {:?}", attempts, delay);
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = cancel.cancelled() => {
                        return (
                            Err(e),
                            RetryReport {
                                attempts,
                                total_duration: start.elapsed(),
                                last_error,
                            },
                        );
                    }
                }
            }
        }
    }
}

/// `Retry` wrapped with a `CircuitBreaker`: the circuit is consulted before
/// every attempt (including the first), and every attempt's outcome feeds
/// back into the breaker (spec §4.1.2's `RetryWithCircuitBreaker`).
pub async fn retry_with_circuit_breaker<T, E, F, Fut>(
    config: &RetryConfig,
    breaker: &CircuitBreaker,
    cancel: &CancellationToken,
    mut f: F,
) -> Result<T, ResilienceError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        if !breaker.allow() {
            return Err(ResilienceError::CircuitOpen);
        }
        let call_start = Instant::now();
        match f(attempts).await {
            Ok(v) => {
                breaker.record_success(call_start.elapsed());
                return Ok(v);
            }
            Err(e) => {
                breaker.record_failure();
                if e.is_cancelled() {
                    return Err(ResilienceError::Cancelled);
                }
                if !e.is_retryable() || attempts >= config.max_attempts {
                    return Err(ResilienceError::RetryExhausted {
                        attempts,
                        last_error: e.to_string(),
                    });
                }
                let delay = calculate_delay(config, attempts);
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = cancel.cancelled() => return Err(ResilienceError::Cancelled),
                }
            }
        }
    }
}

/// Accumulated retry statistics across many `retry` invocations, grounded in
/// how the reference workspace's built-in retry hook tracks effectiveness.
#[derive(Debug, Default)]
pub struct RetryMetrics {
    total_operations: AtomicU64,
    retry_attempts: AtomicU64,
    successful_retries: AtomicU64,
    failed_retries: AtomicU64,
}

/// Point-in-time snapshot of `RetryMetrics`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryMetricsSnapshot {
    pub total_operations: u64,
    pub retry_attempts: u64,
    pub successful_retries: u64,
    pub failed_retries: u64,
}

impl RetryMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, report: &RetryReport, succeeded: bool) {
        self.total_operations.fetch_add(1, Ordering::Relaxed);
        if report.attempts > 1 {
            self.retry_attempts
                .fetch_add(u64::from(report.attempts - 1), Ordering::Relaxed);
            if succeeded {
                self.successful_retries.fetch_add(1, Ordering::Relaxed);
            } else {
                self.failed_retries.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> RetryMetricsSnapshot {
        RetryMetricsSnapshot {
            total_operations: self.total_operations.load(Ordering::Relaxed),
            retry_attempts: self.retry_attempts.load(Ordering::Relaxed),
            successful_retries: self.successful_retries.load(Ordering::Relaxed),
            failed_retries: self.failed_retries.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    #[derive(Debug)]
    struct TestError {
        retryable: bool,
        cancelled: bool,
        msg: &'static str,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.msg)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
        fn is_cancelled(&self) -> bool {
            self.cancelled
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry() {
        let config = RetryConfig::default();
        let cancel = CancellationToken::new();
        let (result, report) = retry(&config, &cancel, |_attempt| async { Ok::<_, TestError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(report.attempts, 1);
    }

    #[tokio::test]
    async fn stops_on_non_retryable_error() {
        let config = RetryConfig {
            backoff: BackoffStrategy::Fixed(Duration::from_millis(1)),
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let (result, report) = retry(&config, &cancel, move |_attempt| {
            calls2.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<i32, _>(TestError {
                    retryable: false,
                    cancelled: false,
                    msg: "bad request",
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(report.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn respects_max_attempts() {
        let config = RetryConfig {
            max_attempts: 3,
            backoff: BackoffStrategy::Fixed(Duration::from_millis(1)),
            jitter: JitterStrategy::None,
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let (result, report) = retry(&config, &cancel, |_attempt| async {
            Err::<i32, _>(TestError {
                retryable: true,
                cancelled: false,
                msg: "timeout",
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(report.attempts, 3);
        assert!(report.attempts <= config.max_attempts);
    }

    #[tokio::test]
    async fn succeeds_on_final_attempt() {
        let config = RetryConfig {
            max_attempts: 3,
            backoff: BackoffStrategy::Fixed(Duration::from_millis(1)),
            jitter: JitterStrategy::None,
        };
        let cancel = CancellationToken::new();
        let count = Arc::new(AtomicU32::new(0));
        let count2 = count.clone();
        let (result, report) = retry(&config, &cancel, move |attempt| {
            let count2 = count2.clone();
            async move {
                count2.fetch_add(1, Ordering::SeqCst);
                if attempt < 3 {
                    Err(TestError {
                        retryable: true,
                        cancelled: false,
                        msg: "timeout",
                    })
                } else {
                    Ok(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(report.attempts, 3);
    }

    #[test]
    fn backoff_is_non_decreasing_without_jitter() {
        let config = RetryConfig {
            max_attempts: 5,
            backoff: BackoffStrategy::Exponential {
                base: Duration::from_millis(100),
                factor: 2.0,
                max: Duration::from_secs(10),
            },
            jitter: JitterStrategy::None,
        };
        let delays: Vec<_> = (1..=5).map(|a| calculate_delay(&config, a)).collect();
        for pair in delays.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn backoff_caps_at_max() {
        let config = RetryConfig {
            max_attempts: 10,
            backoff: BackoffStrategy::Exponential {
                base: Duration::from_millis(100),
                factor: 2.0,
                max: Duration::from_millis(500),
            },
            jitter: JitterStrategy::None,
        };
        let delay = calculate_delay(&config, 10);
        assert!(delay <= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn circuit_breaker_rejects_without_calling_fn() {
        use crate::breaker::{CircuitBreaker, CircuitBreakerConfig};
        let breaker = CircuitBreaker::with_config(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 1,
                ..Default::default()
            },
        );
        breaker.record_failure();
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let config = RetryConfig::default();
        let result = retry_with_circuit_breaker(&config, &breaker, &cancel, move |_attempt| {
            calls2.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, TestError>(1) }
        })
        .await;
        assert!(matches!(result, Err(ResilienceError::CircuitOpen)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
