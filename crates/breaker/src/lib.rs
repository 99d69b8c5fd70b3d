//! Circuit breaker for calls to a degraded dependency.
//!
//! A [`CircuitBreaker`] wraps fallible async operations and tracks
//! consecutive failures:
//! 1. Closed: calls pass through, failures are counted
//! 2. Open: after `failure_threshold` consecutive failures, calls are rejected
//!    with [`BreakerError::Open`] without being attempted
//! 3. Half-open: once `reset_timeout` has passed since the last failure,
//!    exactly one trial call is admitted; its outcome closes or re-opens the
//!    breaker
//!
//! Breakers are explicit values: create one per protected dependency and
//! share it by cloning.

pub mod breaker;
pub mod config;
pub mod error;

pub use breaker::{BreakerState, CircuitBreaker};
pub use config::BreakerConfig;
pub use error::BreakerError;
