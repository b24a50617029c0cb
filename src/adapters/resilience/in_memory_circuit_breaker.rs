//! In-process circuit breaker.
//!
//! One instance is shared by every export request of an Export Manager.
//! Failures are counted in a rolling window; the open state lapses into
//! half-open lazily, on the next state query, once the recovery timeout
//! has elapsed.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use crate::ports::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState};

/// Mutex-guarded circuit breaker for a single process.
#[derive(Debug)]
pub struct InMemoryCircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    /// Failure instants inside the rolling window (closed state only).
    failures: VecDeque<Instant>,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
    half_open_successes: u32,
    total_successes: u64,
    total_failures: u64,
    total_rejections: u64,
    times_opened: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: VecDeque::new(),
            opened_at: None,
            half_open_in_flight: 0,
            half_open_successes: 0,
            total_successes: 0,
            total_failures: 0,
            total_rejections: 0,
            times_opened: 0,
        }
    }
}

impl InMemoryCircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState::new()),
        }
    }

    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Locks the state and applies the time-based Open → HalfOpen lapse.
    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if inner.state == CircuitState::Open {
            let elapsed = inner.opened_at.map(|at| at.elapsed()).unwrap_or_default();
            if elapsed >= self.config.recovery_timeout {
                inner.state = CircuitState::HalfOpen;
                inner.half_open_in_flight = 0;
                inner.half_open_successes = 0;
                tracing::info!(breaker = %self.name, "Circuit half-open, testing recovery");
            }
        }
        inner
    }

    fn trip(&self, inner: &mut BreakerState) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.failures.clear();
        inner.half_open_in_flight = 0;
        inner.half_open_successes = 0;
        inner.times_opened += 1;
        tracing::warn!(
            breaker = %self.name,
            recovery_timeout_ms = self.config.recovery_timeout.as_millis() as u64,
            "Circuit opened"
        );
    }

    fn prune_failures(&self, inner: &mut BreakerState, now: Instant) {
        if let Some(window) = self.config.failure_window {
            while let Some(first) = inner.failures.front() {
                if now.duration_since(*first) > window {
                    inner.failures.pop_front();
                } else {
                    break;
                }
            }
        }
    }
}

impl CircuitBreaker for InMemoryCircuitBreaker {
    fn state(&self) -> CircuitState {
        self.lock().state
    }

    fn should_allow(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                inner.total_rejections += 1;
                false
            }
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight < self.config.half_open_max_requests {
                    inner.half_open_in_flight += 1;
                    true
                } else {
                    inner.total_rejections += 1;
                    false
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        inner.total_successes += 1;
        match inner.state {
            CircuitState::Closed => inner.failures.clear(),
            CircuitState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.opened_at = None;
                    inner.failures.clear();
                    inner.half_open_successes = 0;
                    tracing::info!(breaker = %self.name, "Circuit closed after recovery");
                }
            }
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = self.lock();
        inner.total_failures += 1;
        match inner.state {
            CircuitState::Closed => {
                let now = Instant::now();
                inner.failures.push_back(now);
                self.prune_failures(&mut inner, now);
                if inner.failures.len() as u32 >= self.config.failure_threshold {
                    self.trip(&mut inner);
                }
            }
            CircuitState::HalfOpen => self.trip(&mut inner),
            CircuitState::Open => {}
        }
    }

    fn release(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }
    }

    fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.failures.clear();
        inner.opened_at = None;
        inner.half_open_in_flight = 0;
        inner.half_open_successes = 0;
        tracing::info!(breaker = %self.name, "Circuit manually reset");
    }

    fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.lock();
        let time_until_half_open = match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(at)) => {
                Some(self.config.recovery_timeout.saturating_sub(at.elapsed()))
            }
            _ => None,
        };
        CircuitBreakerMetrics {
            state: Some(inner.state),
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            total_rejections: inner.total_rejections,
            times_opened: inner.times_opened,
            current_failures: inner.failures.len() as u32,
            current_successes: inner.half_open_successes,
            time_until_half_open,
        }
    }
}
