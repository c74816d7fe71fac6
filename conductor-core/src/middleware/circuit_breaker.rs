//! Circuit Breaker Middleware
//!
//! Prevents cascading failures by counting tool failures and rejecting
//! executions outright once a threshold is reached.
//!
//! ```text
//!            failures >= threshold
//!  Closed ─────────────────────────▶ Open
//!    ▲                                │  recovery_timeout elapsed
//!    │ trial succeeds                 ▼
//!    └──────────────────────────── HalfOpen ──▶ Open (trial fails)
//! ```
//!
//! In `HalfOpen` exactly one trial execution is let through; other
//! executions arriving while it is in flight are rejected. A trial that never
//! reports back (its execution was cancelled) is abandoned after another
//! `recovery_timeout`, freeing the slot. Rejections caused by other
//! middleware are neither successes nor failures.

use super::{Middleware, MiddlewareError, Outcome};
use crate::executor::{ExecutionContext, ExecutionError};
use crate::tools::Tool;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - executions pass through
    Closed,
    /// Circuit open - executions are rejected
    Open,
    /// Letting one trial execution through
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Time to wait after the last failure before a trial
    #[serde(default = "default_recovery_timeout", with = "humantime_serde")]
    pub recovery_timeout: Duration,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout: default_recovery_timeout(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a sensitive config (opens quickly)
    pub fn sensitive() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(15),
        }
    }

    /// Create a tolerant config (takes more failures to open)
    pub fn tolerant() -> Self {
        Self {
            failure_threshold: 10,
            recovery_timeout: Duration::from_secs(120),
        }
    }

    /// Builder: set failure threshold
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Builder: set recovery timeout
    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }
}

struct Trial {
    request_id: String,
    started: Instant,
}

struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    trial: Option<Trial>,
}

impl BreakerState {
    fn is_trial(&self, request_id: &str) -> bool {
        self.trial
            .as_ref()
            .is_some_and(|trial| trial.request_id == request_id)
    }
}

/// Circuit breaker around tool execution
pub struct CircuitBreakerMiddleware {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreakerMiddleware {
    /// Create a new circuit breaker
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                trial: None,
            }),
        }
    }

    /// Get current state
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.check_state_transition(&mut inner);
        inner.state
    }

    /// Get consecutive failure count
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Manually close the circuit
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        Self::close(&mut inner);
        tracing::info!("Circuit breaker reset");
    }

    fn check_state_transition(&self, inner: &mut BreakerState) {
        match inner.state {
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure
                    .is_none_or(|at| at.elapsed() >= self.config.recovery_timeout);
                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial = None;
                    tracing::info!("Circuit breaker half-open");
                }
            }
            CircuitState::HalfOpen => {
                let stale = inner
                    .trial
                    .as_ref()
                    .is_some_and(|trial| trial.started.elapsed() >= self.config.recovery_timeout);
                if stale && let Some(trial) = inner.trial.take() {
                    tracing::warn!(
                        request_id = %trial.request_id,
                        "Circuit breaker trial never completed, admitting a new one"
                    );
                }
            }
            CircuitState::Closed => {}
        }
    }

    fn open(inner: &mut BreakerState) {
        inner.state = CircuitState::Open;
        inner.last_failure = Some(Instant::now());
        inner.trial = None;
    }

    fn close(inner: &mut BreakerState) {
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.last_failure = None;
        inner.trial = None;
    }

    fn record_success(&self, inner: &mut BreakerState, request_id: &str) {
        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen if inner.is_trial(request_id) => {
                Self::close(inner);
                tracing::info!("Circuit breaker closed after successful trial");
            }
            _ => {}
        }
    }

    fn record_failure(&self, inner: &mut BreakerState, request_id: &str, tool: &str) {
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                inner.last_failure = Some(Instant::now());
                if inner.failure_count >= self.config.failure_threshold {
                    Self::open(inner);
                    tracing::warn!(
                        tool = %tool,
                        failures = inner.failure_count,
                        "Circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen if inner.is_trial(request_id) => {
                inner.failure_count += 1;
                Self::open(inner);
                tracing::warn!(tool = %tool, "Circuit breaker trial failed, reopening");
            }
            _ => {}
        }
    }
}

impl Default for CircuitBreakerMiddleware {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl std::fmt::Debug for CircuitBreakerMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerMiddleware")
            .field("state", &self.state())
            .field("failure_count", &self.failure_count())
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl Middleware for CircuitBreakerMiddleware {
    fn name(&self) -> &str {
        "circuit_breaker"
    }

    async fn pre_process(
        &self,
        tool: &dyn Tool,
        context: ExecutionContext,
    ) -> Result<ExecutionContext, MiddlewareError> {
        let mut inner = self.inner.lock();
        self.check_state_transition(&mut inner);

        match inner.state {
            CircuitState::Closed => Ok(context),
            CircuitState::Open => {
                tracing::debug!(tool = %tool.name(), "Circuit open, rejecting execution");
                Err(MiddlewareError::rejected(self.name(), "Circuit breaker is open"))
            }
            CircuitState::HalfOpen => {
                if inner.trial.is_some() {
                    return Err(MiddlewareError::rejected(
                        self.name(),
                        "Circuit breaker is half-open and a trial is in flight",
                    ));
                }
                inner.trial = Some(Trial {
                    request_id: context.request_id().to_string(),
                    started: Instant::now(),
                });
                tracing::debug!(tool = %tool.name(), "Circuit half-open, allowing trial execution");
                Ok(context)
            }
        }
    }

    async fn post_process(
        &self,
        tool: &dyn Tool,
        context: &ExecutionContext,
        outcome: &Outcome,
    ) -> Result<(), MiddlewareError> {
        let mut inner = self.inner.lock();
        match outcome {
            Ok(_) => self.record_success(&mut inner, context.request_id()),
            Err(ExecutionError::Rejected { .. }) => {
                // Not the tool's fault; free the trial slot without a verdict
                if inner.is_trial(context.request_id()) {
                    inner.trial = None;
                }
            }
            Err(_) => self.record_failure(&mut inner, context.request_id(), tool.name()),
        }
        Ok(())
    }
}
