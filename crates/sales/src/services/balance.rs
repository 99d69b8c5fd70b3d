//! Balance service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use common::Money;
use serde_json::{Value, json};
use thiserror::Error;

use crate::request::BearerToken;

/// Errors returned by the customers service or the transport to it.
#[derive(Debug, Clone, Error)]
pub enum BalanceError {
    /// The customer's wallet holds less than the requested amount.
    #[error("insufficient wallet balance")]
    InsufficientFunds { details: Value },

    /// The customers service has no record of the user.
    #[error("customer not found")]
    UserNotFound { details: Value },

    /// Any other non-success response.
    #[error("customers service rejected the request with status {status}")]
    Rejected { status: u16, details: Value },

    /// The service could not be reached.
    #[error("customers service unreachable: {0}")]
    Unavailable(String),

    /// No response arrived within the configured timeout.
    #[error("customers service timed out")]
    Timeout,
}

impl BalanceError {
    /// Returns true for outages, as opposed to business rejections from a
    /// healthy service. Only these count against the circuit breaker.
    pub fn is_transient(&self) -> bool {
        match self {
            BalanceError::Unavailable(_) | BalanceError::Timeout => true,
            BalanceError::Rejected { status, .. } => *status >= 500,
            BalanceError::InsufficientFunds { .. } | BalanceError::UserNotFound { .. } => false,
        }
    }

    /// Returns true when no answer came back at all. Anything else is an
    /// HTTP-level answer and is surfaced to the buyer as a failed deduction.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, BalanceError::Unavailable(_) | BalanceError::Timeout)
    }

    /// The upstream response body, when the service answered.
    pub fn details(&self) -> Option<&Value> {
        match self {
            BalanceError::InsufficientFunds { details }
            | BalanceError::UserNotFound { details }
            | BalanceError::Rejected { details, .. } => Some(details),
            BalanceError::Unavailable(_) | BalanceError::Timeout => None,
        }
    }
}

/// Wallet operations on the customers service.
#[async_trait]
pub trait BalanceService: Send + Sync {
    /// Deducts `amount` from the user's wallet.
    async fn deduct(
        &self,
        username: &str,
        amount: Money,
        token: &BearerToken,
    ) -> Result<(), BalanceError>;

    /// Credits `amount` back to the user's wallet.
    async fn refund(
        &self,
        username: &str,
        amount: Money,
        token: &BearerToken,
    ) -> Result<(), BalanceError>;
}

#[derive(Debug, Default)]
struct InMemoryBalanceState {
    wallets: HashMap<String, Money>,
    deduct_calls: usize,
    refund_calls: usize,
    unavailable: bool,
    delay: Option<Duration>,
}

/// In-memory customers service for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBalanceService {
    state: Arc<Mutex<InMemoryBalanceState>>,
}

impl InMemoryBalanceService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a wallet with the given balance.
    pub fn with_balance(self, username: impl Into<String>, balance: Money) -> Self {
        self.lock().wallets.insert(username.into(), balance);
        self
    }

    /// Returns the user's balance, if the user exists.
    pub fn balance(&self, username: &str) -> Option<Money> {
        self.lock().wallets.get(username).copied()
    }

    /// Number of deduct calls received, including failed ones.
    pub fn deduct_calls(&self) -> usize {
        self.lock().deduct_calls
    }

    /// Number of refund calls received.
    pub fn refund_calls(&self) -> usize {
        self.lock().refund_calls
    }

    /// Makes every call fail as if the service were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Delays every call by `delay` before it is handled.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryBalanceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn pause(&self) {
        let delay = self.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn customer_not_found() -> BalanceError {
    BalanceError::UserNotFound {
        details: json!({ "message": "Customer not found" }),
    }
}

#[async_trait]
impl BalanceService for InMemoryBalanceService {
    async fn deduct(
        &self,
        username: &str,
        amount: Money,
        _token: &BearerToken,
    ) -> Result<(), BalanceError> {
        self.lock().deduct_calls += 1;
        self.pause().await;

        let mut state = self.lock();
        if state.unavailable {
            return Err(BalanceError::Unavailable("connection refused".to_string()));
        }
        if !amount.is_positive() {
            return Err(BalanceError::Rejected {
                status: 400,
                details: json!({ "message": "Amount must be positive" }),
            });
        }

        let balance = state
            .wallets
            .get_mut(username)
            .ok_or_else(customer_not_found)?;
        if *balance < amount {
            return Err(BalanceError::InsufficientFunds {
                details: json!({ "message": "Insufficient wallet balance" }),
            });
        }
        *balance = *balance - amount;
        Ok(())
    }

    async fn refund(
        &self,
        username: &str,
        amount: Money,
        _token: &BearerToken,
    ) -> Result<(), BalanceError> {
        self.lock().refund_calls += 1;
        self.pause().await;

        let mut state = self.lock();
        if state.unavailable {
            return Err(BalanceError::Unavailable("connection refused".to_string()));
        }

        let balance = state
            .wallets
            .get_mut(username)
            .ok_or_else(customer_not_found)?;
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| BalanceError::Rejected {
                status: 400,
                details: json!({ "message": "Amount out of range" }),
            })?;
        Ok(())
    }
}
