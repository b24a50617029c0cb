//! CircuitBreaker port - Interface for renderer resilience.
//!
//! The circuit breaker pattern prevents cascading failures when the
//! rendering stage (for example a broken block-format dependency) keeps
//! failing and retries would only hammer it further.
//!
//! ## States
//!
//! - **Closed**: Normal operation, requests flow through
//! - **Open**: Too many failures, requests rejected immediately
//! - **Half-Open**: Testing if the stage recovered, limited requests allowed
//!
//! ## Transitions
//!
//! ```text
//! Closed --[failure_threshold exceeded within failure_window]--> Open
//! Open --[recovery_timeout elapsed]--> Half-Open
//! Half-Open --[success_threshold reached]--> Closed
//! Half-Open --[any failure]--> Open
//! ```

use std::time::Duration;

use serde::Serialize;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - requests flow through.
    Closed,

    /// Too many failures - requests rejected immediately.
    /// The circuit will transition to HalfOpen after recovery_timeout.
    Open,

    /// Testing recovery - limited requests allowed through.
    /// Success → Closed, Failure → Open.
    HalfOpen,
}

impl CircuitState {
    /// Check if the circuit allows requests through.
    pub fn allows_requests(&self) -> bool {
        matches!(self, CircuitState::Closed | CircuitState::HalfOpen)
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening circuit.
    ///
    /// Default: 5 failures
    pub failure_threshold: u32,

    /// Time to wait before testing recovery (moving to half-open).
    ///
    /// Default: 30 seconds
    pub recovery_timeout: Duration,

    /// Number of successes in half-open state needed to close circuit.
    ///
    /// Default: 1 success
    pub success_threshold: u32,

    /// Maximum concurrent trial requests in half-open state.
    ///
    /// Default: 1 request at a time
    pub half_open_max_requests: u32,

    /// Rolling window for counting failures.
    ///
    /// If set, only failures within this window count toward threshold.
    /// If unset, failures count until a success resets them.
    pub failure_window: Option<Duration>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 1,
            half_open_max_requests: 1,
            failure_window: Some(Duration::from_secs(60)),
        }
    }
}

impl CircuitBreakerConfig {
    /// Config tuned for the rendering stage: quick to trip, quick to retest.
    pub fn for_renderer() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(15),
            success_threshold: 1,
            half_open_max_requests: 1,
            failure_window: Some(Duration::from_secs(60)),
        }
    }
}

/// Port for circuit breaker functionality.
///
/// # Example
///
/// ```ignore
/// if !breaker.should_allow() {
///     return Err(ExportError::circuit_open("renderer circuit is open"));
/// }
///
/// match generator.generate(job).await {
///     Ok(result) => {
///         breaker.record_success();
///         Ok(result)
///     }
///     Err(e) => {
///         breaker.record_failure();
///         Err(e)
///     }
/// }
/// ```
pub trait CircuitBreaker: Send + Sync {
    /// Get the current state of the circuit.
    fn state(&self) -> CircuitState;

    /// Check if a request should be allowed through.
    ///
    /// Returns `false` while open. In half-open state this also reserves one
    /// of the limited trial slots; the slot is released by the following
    /// `record_success`, `record_failure` or `release`.
    fn should_allow(&self) -> bool;

    /// Record a successful request.
    fn record_success(&self);

    /// Record a failed request.
    fn record_failure(&self);

    /// Ends an allowed request whose outcome says nothing about downstream
    /// health.
    ///
    /// Frees a half-open trial slot; failure and success counts are left
    /// untouched, so the circuit neither closes nor forgets failures.
    fn release(&self);

    /// Force reset the circuit to closed state.
    fn reset(&self);

    /// Get metrics about the circuit breaker.
    fn metrics(&self) -> CircuitBreakerMetrics;
}

/// Metrics about circuit breaker behavior.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerMetrics {
    /// Current state
    pub state: Option<CircuitState>,

    /// Total successful requests since creation
    pub total_successes: u64,

    /// Total failed requests since creation
    pub total_failures: u64,

    /// Total requests rejected while open
    pub total_rejections: u64,

    /// Times the circuit has opened
    pub times_opened: u64,

    /// Current failure count (in closed state)
    pub current_failures: u32,

    /// Current success count (in half-open state)
    pub current_successes: u32,

    /// Time until circuit transitions to half-open (when open)
    #[serde(skip)]
    pub time_until_half_open: Option<Duration>,
}
