//! Circuit breaker for arbitrary async operations
//!
//! Independent of the queue: wraps any fallible async operation with a
//! CLOSED → OPEN → HALF_OPEN state machine and an operation timeout. The
//! `execute` API never returns an error itself — callers inspect the
//! [`ExecutionOutcome`] envelope, where a rejected call (open circuit) is
//! distinct from a failed operation.

use anyhow::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CircuitState {
    /// Requests flow through normally.
    #[default]
    Closed,
    /// Requests are rejected without invoking the operation.
    Open,
    /// Limited-trust probe period after the recovery timeout.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in CLOSED before the circuit opens.
    pub failure_threshold: u32,
    /// Successes in HALF_OPEN needed to close the circuit.
    pub success_threshold: u32,
    /// Time the circuit stays OPEN before the next probe is allowed.
    pub recovery_timeout: Duration,
    /// Per-operation timeout; elapsing counts as a failure. The operation is
    /// not cancelled, only orphaned.
    pub operation_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            operation_timeout: Duration::from_secs(10),
        }
    }
}

/// Result envelope returned by [`CircuitBreaker::execute`].
#[derive(Debug)]
pub struct ExecutionOutcome<T> {
    /// Present iff the operation ran and succeeded.
    pub result: Option<T>,
    /// Present iff the operation ran and failed (or timed out).
    pub error: Option<String>,
    /// Breaker state after the call was accounted for.
    pub state: CircuitState,
    /// Whether the operation was invoked at all.
    pub executed: bool,
    /// Whether the call was rejected by an open circuit.
    pub rejected: bool,
    pub duration: Duration,
}

impl<T> ExecutionOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }
}

/// Lifetime counters; `reset()` leaves these intact.
#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub rejected_calls: u64,
}

#[derive(Debug)]
struct BreakerCore {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_state_change: Instant,
    /// Earliest instant an OPEN circuit allows a probe; evaluated lazily on
    /// `execute`, not by a timer.
    next_attempt: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    core: Mutex<BreakerCore>,
    total_calls: AtomicU64,
    successful_calls: AtomicU64,
    failed_calls: AtomicU64,
    rejected_calls: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            core: Mutex::new(BreakerCore {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_state_change: Instant::now(),
                next_attempt: None,
            }),
            total_calls: AtomicU64::new(0),
            successful_calls: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
            rejected_calls: AtomicU64::new(0),
        }
    }

    /// Run `operation` under the breaker. Never returns an error: rejections
    /// and failures are reported through the outcome envelope.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> ExecutionOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.total_calls.fetch_add(1, Ordering::SeqCst);

        if !self.try_acquire() {
            self.rejected_calls.fetch_add(1, Ordering::SeqCst);
            debug!(state = %self.state(), "circuit open, call rejected");
            return ExecutionOutcome {
                result: None,
                error: None,
                state: self.state(),
                executed: false,
                rejected: true,
                duration: Duration::ZERO,
            };
        }

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.config.operation_timeout, operation()).await;
        let duration = started.elapsed();

        let (result, error) = match outcome {
            Ok(Ok(value)) => {
                self.record_success();
                (Some(value), None)
            }
            Ok(Err(error)) => {
                self.record_failure();
                (None, Some(error.to_string()))
            }
            Err(_elapsed) => {
                self.record_failure();
                (
                    None,
                    Some(format!(
                        "operation timed out after {:?}",
                        self.config.operation_timeout
                    )),
                )
            }
        };

        ExecutionOutcome {
            result,
            error,
            state: self.state(),
            executed: true,
            rejected: false,
            duration,
        }
    }

    /// Whether a call may proceed, transitioning OPEN → HALF_OPEN once the
    /// recovery timeout has elapsed.
    fn try_acquire(&self) -> bool {
        let mut core = self.core.lock();
        match core.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let recovered = core
                    .next_attempt
                    .map(|at| Instant::now() >= at)
                    .unwrap_or(false);
                if recovered {
                    Self::transition(&mut core, CircuitState::HalfOpen);
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self) {
        self.successful_calls.fetch_add(1, Ordering::SeqCst);
        let mut core = self.core.lock();
        match core.state {
            CircuitState::Closed => {
                // Full reset, not decrement.
                core.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                core.success_count += 1;
                if core.success_count >= self.config.success_threshold {
                    Self::transition(&mut core, CircuitState::Closed);
                }
            }
            CircuitState::Open => {
                warn!("recorded success while circuit is open");
            }
        }
    }

    fn record_failure(&self) {
        self.failed_calls.fetch_add(1, Ordering::SeqCst);
        let mut core = self.core.lock();
        match core.state {
            CircuitState::Closed => {
                core.failure_count += 1;
                if core.failure_count >= self.config.failure_threshold {
                    let next = Instant::now() + self.config.recovery_timeout;
                    Self::transition(&mut core, CircuitState::Open);
                    core.next_attempt = Some(next);
                }
            }
            CircuitState::HalfOpen => {
                // Single strike fails the probe.
                let next = Instant::now() + self.config.recovery_timeout;
                Self::transition(&mut core, CircuitState::Open);
                core.next_attempt = Some(next);
            }
            CircuitState::Open => {}
        }
    }

    fn transition(core: &mut BreakerCore, to: CircuitState) {
        if core.state == to {
            return;
        }
        match to {
            CircuitState::Open => warn!(from = %core.state, "circuit breaker opening"),
            CircuitState::HalfOpen => {
                info!(from = %core.state, "circuit breaker half-open, probing recovery")
            }
            CircuitState::Closed => info!(from = %core.state, "circuit breaker closed"),
        }
        core.state = to;
        core.last_state_change = Instant::now();
        core.success_count = 0;
        if to == CircuitState::Closed {
            core.failure_count = 0;
            core.next_attempt = None;
        }
    }

    pub fn state(&self) -> CircuitState {
        self.core.lock().state
    }

    /// Administrative override: block all calls until `reset` or recovery.
    pub fn force_open(&self) {
        info!("forcing circuit breaker open");
        let mut core = self.core.lock();
        let next = Instant::now() + self.config.recovery_timeout;
        Self::transition(&mut core, CircuitState::Open);
        core.next_attempt = Some(next);
    }

    /// Administrative override: resume normal operation immediately.
    pub fn force_close(&self) {
        info!("forcing circuit breaker closed");
        let mut core = self.core.lock();
        Self::transition(&mut core, CircuitState::Closed);
    }

    /// Reinitialize to CLOSED. Failure/success counters reset; cumulative
    /// totals are lifetime values and survive.
    pub fn reset(&self) {
        debug!("resetting circuit breaker");
        let mut core = self.core.lock();
        core.state = CircuitState::Closed;
        core.failure_count = 0;
        core.success_count = 0;
        core.last_state_change = Instant::now();
        core.next_attempt = None;
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let core = self.core.lock();
        CircuitBreakerStats {
            state: core.state,
            failure_count: core.failure_count,
            success_count: core.success_count,
            total_calls: self.total_calls.load(Ordering::SeqCst),
            successful_calls: self.successful_calls.load(Ordering::SeqCst),
            failed_calls: self.failed_calls.load(Ordering::SeqCst),
            rejected_calls: self.rejected_calls.load(Ordering::SeqCst),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }
}
