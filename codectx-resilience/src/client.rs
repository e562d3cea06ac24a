//! Resilient external-service client (spec §4.1.4): wraps an LLM or
//! vector-store client with connection-state tracking, a sliding-window
//! failure counter, an adaptive health checker, and degradation handlers.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use codectx_core::state::{ConnectionState, DegradationMode};

use crate::error::ResilienceError;
use crate::retry::{retry, RetryConfig, Retryable};

/// Component-specific reaction to the client's connection state crossing
/// an edge (connected→degraded, degraded→connected, etc). Implementors
/// surface a `should_skip` predicate that feature call sites query before
/// attempting an operation, so a library-doc lookup or memory retrieval
/// can cheaply no-op while the backing service is unhealthy.
pub trait DegradationHandler: Send + Sync {
    fn on_degraded(&self, reason: &str);
    fn on_recovered(&self);
    fn mode(&self) -> DegradationMode;
    fn should_skip(&self) -> bool {
        self.mode() == DegradationMode::Disabled
    }
}

/// Configuration for [`ResilientClient`].
#[derive(Debug, Clone)]
pub struct ResilientClientConfig {
    pub allow_start_degraded: bool,
    pub health_check_interval: Duration,
    pub degraded_check_interval: Duration,
    pub circuit_window: Duration,
    pub circuit_threshold: usize,
    pub cooldown: Duration,
    pub retry: RetryConfig,
}

impl Default for ResilientClientConfig {
    fn default() -> Self {
        Self {
            allow_start_degraded: true,
            health_check_interval: Duration::from_secs(30),
            degraded_check_interval: Duration::from_secs(5),
            circuit_window: Duration::from_secs(60),
            circuit_threshold: 5,
            cooldown: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }
}

struct Inner {
    state: ConnectionState,
    failure_times: VecDeque<Instant>,
    circuit_open_time: Option<Instant>,
}

/// Wraps a fallible async operation with connection-state tracking, a
/// sliding-window circuit breaker, retry-with-jitter, and handler
/// notification on state edge crossings.
pub struct ResilientClient {
    config: ResilientClientConfig,
    inner: Mutex<Inner>,
    half_open_probe_in_flight: AtomicBool,
    handlers: Vec<Arc<dyn DegradationHandler>>,
}

impl ResilientClient {
    /// Runs one health check. If it fails and `allow_start_degraded` is
    /// false, construction fails — the caller has no usable client.
    pub async fn connect<H, Fut>(
        config: ResilientClientConfig,
        handlers: Vec<Arc<dyn DegradationHandler>>,
        health_check: H,
    ) -> Result<Self, ResilienceError>
    where
        H: Fn() -> Fut,
        Fut: Future<Output = bool>,
    {
        let healthy = health_check().await;
        let state = if healthy {
            ConnectionState::Connected
        } else if config.allow_start_degraded {
            ConnectionState::Degraded
        } else {
            return Err(ResilienceError::UnhealthyAtStartup(
                "initial health check failed and allow_start_degraded is false".to_string(),
            ));
        };
        if state == ConnectionState::Degraded {
            for h in &handlers {
                h.on_degraded("failed initial health check");
            }
        }
        Ok(Self {
            config,
            inner: Mutex::new(Inner {
                state,
                failure_times: VecDeque::new(),
                circuit_open_time: None,
            }),
            half_open_probe_in_flight: AtomicBool::new(false),
            handlers,
        })
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    fn notify_transition(&self, from: ConnectionState, to: ConnectionState) {
        if from == to {
            return;
        }
        info!(?from, ?to, "resilient client connection state transition");
        match to {
            ConnectionState::Connected => {
                for h in &self.handlers {
                    h.on_recovered();
                }
            }
            ConnectionState::Degraded | ConnectionState::CircuitOpen => {
                for h in &self.handlers {
                    h.on_degraded(&format!("connection state entered {to:?}"));
                }
            }
            ConnectionState::HalfOpen => {}
        }
    }

    /// Polls `health_check` on an interval that adapts to the current
    /// state, notifying handlers exactly once per edge crossing. Runs
    /// until `cancel` fires.
    pub async fn run_health_loop<H, Fut>(&self, cancel: CancellationToken, health_check: H)
    where
        H: Fn() -> Fut,
        Fut: Future<Output = bool>,
    {
        loop {
            let interval = match self.state() {
                ConnectionState::Connected => self.config.health_check_interval,
                _ => self.config.degraded_check_interval,
            };
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(interval) => {}
            }
            let healthy = health_check().await;
            let mut guard = self.inner.lock();
            let from = guard.state;
            let to = if healthy {
                ConnectionState::Connected
            } else if from == ConnectionState::CircuitOpen {
                from
            } else {
                ConnectionState::Degraded
            };
            if healthy {
                guard.failure_times.clear();
                guard.circuit_open_time = None;
            }
            guard.state = to;
            drop(guard);
            self.notify_transition(from, to);
        }
    }

    fn record_failure(&self) {
        let mut guard = self.inner.lock();
        let now = Instant::now();
        guard.failure_times.push_back(now);
        let window = self.config.circuit_window;
        while let Some(&front) = guard.failure_times.front() {
            if now.duration_since(front) > window {
                guard.failure_times.pop_front();
            } else {
                break;
            }
        }
        let from = guard.state;
        if guard.failure_times.len() >= self.config.circuit_threshold
            && from != ConnectionState::CircuitOpen
        {
            guard.state = ConnectionState::CircuitOpen;
            guard.circuit_open_time = Some(now);
            drop(guard);
            self.notify_transition(from, ConnectionState::CircuitOpen);
            warn!("resilient client circuit opened on sliding-window failure threshold");
        }
    }

    fn record_success(&self) {
        let mut guard = self.inner.lock();
        let from = guard.state;
        if from == ConnectionState::HalfOpen || from == ConnectionState::CircuitOpen {
            guard.state = ConnectionState::Connected;
            guard.failure_times.clear();
            guard.circuit_open_time = None;
            drop(guard);
            self.half_open_probe_in_flight.store(false, Ordering::SeqCst);
            self.notify_transition(from, ConnectionState::Connected);
        }
    }

    fn should_try_half_open(&self) -> bool {
        let guard = self.inner.lock();
        match guard.circuit_open_time {
            Some(opened) => opened.elapsed() >= self.config.cooldown,
            None => false,
        }
    }

    /// Executes `f` under the client's resilience policy. Returns
    /// [`ResilienceError::CircuitOpen`] immediately if the circuit is open
    /// and the cooldown has not elapsed; in half-open, only a single
    /// in-flight probe is admitted.
    pub async fn execute<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        f: F,
    ) -> Result<T, ResilienceError>
    where
        E: Retryable + std::fmt::Display,
        F: Fn(u32) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        if self.state() == ConnectionState::CircuitOpen {
            if !self.should_try_half_open() {
                return Err(ResilienceError::CircuitOpen);
            }
            if self
                .half_open_probe_in_flight
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return Err(ResilienceError::CircuitOpen);
            }
            self.inner.lock().state = ConnectionState::HalfOpen;
            debug!("resilient client admitting single half-open probe");
        }

        let (result, _report) = retry(&self.config.retry, cancel, &f).await;
        match result {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                if self.state() == ConnectionState::HalfOpen {
                    self.half_open_probe_in_flight.store(false, Ordering::SeqCst);
                }
                self.record_failure();
                Err(ResilienceError::Inner(e.to_string()))
            }
        }
    }
}
