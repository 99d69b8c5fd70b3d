//! Circuit breaker state machine (closed / open / half-open).

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::error::BreakerError;

/// Observable circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls pass through and failures are counted.
    Closed,
    /// Calls are rejected without being attempted.
    Open,
    /// One trial call is in flight; everything else is rejected.
    HalfOpen,
}

impl BreakerState {
    fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
enum CircuitInternalState {
    Closed { consecutive_failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { opened_at: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
}

struct Inner {
    name: String,
    config: BreakerConfig,
    state: Mutex<CircuitInternalState>,
}

/// Circuit breaker guarding one dependency.
///
/// Clones share state, so one instance can be handed to every caller of the
/// protected dependency. The state lock is never held while the wrapped
/// operation runs.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                config: BreakerConfig::new(config.failure_threshold, config.reset_timeout),
                state: Mutex::new(CircuitInternalState::Closed {
                    consecutive_failures: 0,
                }),
            }),
        }
    }

    /// Returns the breaker's name, used in logs, metrics and `Open` errors.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the breaker's configuration.
    pub fn config(&self) -> BreakerConfig {
        self.inner.config
    }

    /// Snapshot of the current state.
    ///
    /// An open breaker whose reset timeout has elapsed still reports `Open`
    /// until the next call claims the trial slot.
    pub fn state(&self) -> BreakerState {
        match *self.lock() {
            CircuitInternalState::Closed { .. } => BreakerState::Closed,
            CircuitInternalState::Open { .. } => BreakerState::Open,
            CircuitInternalState::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    /// Returns true if a call made now would be attempted.
    ///
    /// Does not claim the half-open trial slot. Lets a caller refuse work up
    /// front when a later step would be rejected anyway.
    pub fn allows_calls(&self) -> bool {
        match *self.lock() {
            CircuitInternalState::Closed { .. } => true,
            CircuitInternalState::Open { opened_at } => {
                opened_at.elapsed() >= self.inner.config.reset_timeout
            }
            CircuitInternalState::HalfOpen { .. } => false,
        }
    }

    /// Consecutive failures counted while closed.
    pub fn consecutive_failures(&self) -> u32 {
        match *self.lock() {
            CircuitInternalState::Closed {
                consecutive_failures,
            } => consecutive_failures,
            _ => self.inner.config.failure_threshold,
        }
    }

    /// Runs `op` through the breaker, counting every error as a failure.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_with(op, |_| true).await
    }

    /// Runs `op` through the breaker, counting only errors for which
    /// `is_failure` returns true.
    ///
    /// Errors that are not failures (e.g. a business rejection from a healthy
    /// dependency) are returned to the caller and count as a success for the
    /// breaker. The breaker never retries.
    pub async fn call_with<T, E, F, Fut, P>(
        &self,
        op: F,
        is_failure: P,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnOnce(&E) -> bool,
    {
        let Some(admission) = self.admit() else {
            metrics::counter!("circuit_breaker_rejections_total", "breaker" => self.inner.name.clone())
                .increment(1);
            return Err(BreakerError::Open {
                name: self.inner.name.clone(),
            });
        };

        let mut trial = TrialGuard {
            breaker: self,
            armed: admission == Admission::Trial,
        };
        let result = op().await;
        trial.armed = false;

        let outcome = match &result {
            Err(e) if is_failure(e) => Outcome::Failure,
            _ => Outcome::Success,
        };
        self.record(admission, outcome);

        result.map_err(BreakerError::Inner)
    }

    fn lock(&self) -> MutexGuard<'_, CircuitInternalState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self) -> Option<Admission> {
        let mut state = self.lock();
        match *state {
            CircuitInternalState::Closed { .. } => Some(Admission::Normal),
            CircuitInternalState::Open { opened_at }
                if opened_at.elapsed() >= self.inner.config.reset_timeout =>
            {
                *state = CircuitInternalState::HalfOpen { opened_at };
                self.transitioned(BreakerState::HalfOpen);
                tracing::info!(breaker = %self.inner.name, "circuit breaker half-open, admitting trial call");
                Some(Admission::Trial)
            }
            CircuitInternalState::Open { .. } | CircuitInternalState::HalfOpen { .. } => None,
        }
    }

    fn record(&self, admission: Admission, outcome: Outcome) {
        let threshold = self.inner.config.failure_threshold;
        let mut state = self.lock();

        *state = match (admission, outcome, *state) {
            (Admission::Trial, Outcome::Success, _) => {
                self.transitioned(BreakerState::Closed);
                tracing::info!(breaker = %self.inner.name, "circuit breaker closed after successful trial");
                CircuitInternalState::Closed {
                    consecutive_failures: 0,
                }
            }
            (Admission::Trial, Outcome::Failure, _) => {
                self.transitioned(BreakerState::Open);
                tracing::warn!(breaker = %self.inner.name, "trial call failed, circuit breaker re-opened");
                CircuitInternalState::Open {
                    opened_at: Instant::now(),
                }
            }
            (Admission::Normal, Outcome::Success, CircuitInternalState::Closed { .. }) => {
                CircuitInternalState::Closed {
                    consecutive_failures: 0,
                }
            }
            (
                Admission::Normal,
                Outcome::Failure,
                CircuitInternalState::Closed {
                    consecutive_failures,
                },
            ) => {
                let failures = consecutive_failures.saturating_add(1);
                if failures >= threshold {
                    self.transitioned(BreakerState::Open);
                    tracing::warn!(breaker = %self.inner.name, failures, "circuit breaker opened");
                    CircuitInternalState::Open {
                        opened_at: Instant::now(),
                    }
                } else {
                    CircuitInternalState::Closed {
                        consecutive_failures: failures,
                    }
                }
            }
            // A straggler admitted before the breaker opened failed late.
            (Admission::Normal, Outcome::Failure, CircuitInternalState::Open { .. }) => {
                CircuitInternalState::Open {
                    opened_at: Instant::now(),
                }
            }
            // Only the trial decides the outcome of a half-open breaker.
            (Admission::Normal, _, current) => current,
        };
    }

    fn transitioned(&self, to: BreakerState) {
        metrics::counter!(
            "circuit_breaker_transitions_total",
            "breaker" => self.inner.name.clone(),
            "to" => to.as_str()
        )
        .increment(1);
    }
}

/// Releases the trial slot if the trial call's future is dropped before it
/// completes, so the breaker does not stay half-open forever.
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.breaker.lock();
        if let CircuitInternalState::HalfOpen { opened_at } = *state {
            *state = CircuitInternalState::Open { opened_at };
            tracing::debug!(breaker = %self.breaker.inner.name, "trial call cancelled, breaker re-opened");
        }
    }
}
