//! Circuit breaker (spec §4.1.1).

use codectx_core::CircuitState;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Circuit breaker tuning. Defaults match spec §6's recognized options.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub half_open_max_requests: u32,
    pub success_threshold: u32,
    /// Consecutive slow (but successful) calls before the circuit opens.
    /// `None` disables slow-call tripping entirely.
    pub slow_call_threshold: Option<u32>,
    pub slow_call_duration: Option<Duration>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_max_requests: 2,
            success_threshold: 2,
            slow_call_threshold: None,
            slow_call_duration: None,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    half_open_admitted: u32,
    time_of_open: Option<Instant>,
    slow_calls: u32,
    total_calls: u64,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            half_open_admitted: 0,
            time_of_open: None,
            slow_calls: 0,
            total_calls: 0,
        }
    }
}

impl Inner {
    fn transition(&mut self, name: &str, to: CircuitState) {
        if self.state != to {
            info!("circuit breaker '{}' {:?} -> {:?}", name, self.state, to);
        }
        self.state = to;
        match to {
            CircuitState::Open => {
                self.time_of_open = Some(Instant::now());
                self.half_open_admitted = 0;
                self.consecutive_successes = 0;
                self.slow_calls = 0;
            }
            CircuitState::HalfOpen => {
                self.consecutive_successes = 0;
                self.half_open_admitted = 0;
            }
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                self.consecutive_successes = 0;
                self.slow_calls = 0;
                self.time_of_open = None;
            }
        }
    }
}

/// Snapshot of a breaker's counters at a point in time.
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub total_calls: u64,
}

/// Thread-safe circuit breaker. `allow`/`record_success`/`record_failure`
/// may be called from arbitrarily interleaved threads.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: RwLock<Inner>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    #[must_use]
    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Returns true iff the current state allows a call to proceed. In
    /// `Open`, lazily transitions to `HalfOpen` and admits one probe once
    /// `reset_timeout` has elapsed since the circuit opened.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.write();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = inner
                    .time_of_open
                    .map(|t| t.elapsed() >= self.config.reset_timeout)
                    .unwrap_or(false);
                if elapsed {
                    inner.transition(&self.name, CircuitState::HalfOpen);
                    inner.half_open_admitted = 1;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_admitted < self.config.half_open_max_requests {
                    inner.half_open_admitted += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call, optionally timed for slow-call tripping.
    pub fn record_success(&self, duration: Duration) {
        let mut inner = self.inner.write();
        inner.total_calls += 1;
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
                if let (Some(threshold), Some(slow_dur)) =
                    (self.config.slow_call_threshold, self.config.slow_call_duration)
                {
                    if duration >= slow_dur {
                        inner.slow_calls += 1;
                        if inner.slow_calls >= threshold {
                            inner.transition(&self.name, CircuitState::Open);
                        }
                    } else {
                        inner.slow_calls = 0;
                    }
                }
            }
            CircuitState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    inner.transition(&self.name, CircuitState::Closed);
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call. Any failure while `HalfOpen` re-opens the
    /// circuit immediately.
    pub fn record_failure(&self) {
        let mut inner = self.inner.write();
        inner.total_calls += 1;
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.transition(&self.name, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                inner.transition(&self.name, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.read().state
    }

    #[must_use]
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.read();
        CircuitBreakerStats {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
            total_calls: inner.total_calls,
        }
    }

    /// Force the breaker back to `Closed`, clearing all counters.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.transition(&self.name, CircuitState::Closed);
        inner.total_calls = 0;
    }
}

/// Owns a set of named breakers created on demand, shared across call sites
/// (the Summarizer's LLM calls, a future retriever's vector-store calls, …)
/// that each want an independently-tripping breaker.
pub struct CircuitBreakerManager {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerManager {
    #[must_use]
    pub fn new() -> Self {
        Self::with_default_config(CircuitBreakerConfig::default())
    }

    #[must_use]
    pub fn with_default_config(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            default_config,
        }
    }

    #[must_use]
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::with_config(name, self.default_config.clone()))
            })
            .clone()
    }

    #[must_use]
    pub fn create_custom(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        let breaker = Arc::new(CircuitBreaker::with_config(name, config));
        self.breakers.insert(name.to_string(), breaker.clone());
        breaker
    }

    #[must_use]
    pub fn all_stats(&self) -> Vec<(String, CircuitBreakerStats)> {
        self.breakers
            .iter()
            .map(|e| (e.key().clone(), e.value().stats()))
            .collect()
    }

    pub fn reset_all(&self) {
        for b in &self.breakers {
            b.value().reset();
        }
    }
}

impl Default for CircuitBreakerManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn opens_on_failure_threshold() {
        let breaker = CircuitBreaker::with_config(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 3,
                reset_timeout: Duration::from_millis(50),
                ..Default::default()
            },
        );

        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow());

        thread::sleep(Duration::from_millis(80));
        assert!(breaker.allow());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn failure_threshold_one_opens_immediately() {
        let breaker = CircuitBreaker::with_config(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 1,
                ..Default::default()
            },
        );
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn half_open_admits_bounded_requests() {
        let breaker = CircuitBreaker::with_config(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 1,
                reset_timeout: Duration::from_millis(10),
                half_open_max_requests: 2,
                ..Default::default()
            },
        );
        breaker.record_failure();
        thread::sleep(Duration::from_millis(20));

        assert!(breaker.allow()); // first half-open probe
        assert!(breaker.allow()); // second
        assert!(!breaker.allow()); // exhausted
    }

    #[test]
    fn any_failure_in_half_open_reopens() {
        let breaker = CircuitBreaker::with_config(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 1,
                reset_timeout: Duration::from_millis(10),
                success_threshold: 2,
                ..Default::default()
            },
        );
        breaker.record_failure();
        thread::sleep(Duration::from_millis(20));
        assert!(breaker.allow());
        breaker.record_success(Duration::ZERO);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn closes_after_success_threshold_in_half_open() {
        let breaker = CircuitBreaker::with_config(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 1,
                reset_timeout: Duration::from_millis(10),
                success_threshold: 2,
                half_open_max_requests: 5,
                ..Default::default()
            },
        );
        breaker.record_failure();
        thread::sleep(Duration::from_millis(20));
        assert!(breaker.allow());
        breaker.record_success(Duration::ZERO);
        breaker.record_success(Duration::ZERO);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn reset_forces_closed() {
        let breaker = CircuitBreaker::with_config(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 1,
                ..Default::default()
            },
        );
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.stats().consecutive_failures, 0);
    }

    #[test]
    fn slow_calls_trip_when_configured() {
        let breaker = CircuitBreaker::with_config(
            "test",
            CircuitBreakerConfig {
                slow_call_threshold: Some(2),
                slow_call_duration: Some(Duration::from_millis(50)),
                ..Default::default()
            },
        );
        breaker.record_success(Duration::from_millis(60));
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_success(Duration::from_millis(70));
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn manager_reuses_named_breakers() {
        let manager = CircuitBreakerManager::new();
        let a = manager.get_or_create("llm");
        let b = manager.get_or_create("llm");
        assert!(Arc::ptr_eq(&a, &b));

        let c = manager.get_or_create("vector-store");
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(manager.all_stats().len(), 2);
    }
}
