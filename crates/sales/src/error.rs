//! Purchase error types.

use common::{GoodsId, Money};
use ledger::LedgerError;
use thiserror::Error;

use crate::request::FieldErrors;
use crate::services::BalanceError;

/// Errors that can occur while placing a purchase or reading history.
#[derive(Debug, Error)]
pub enum PurchaseError {
    /// The request failed field validation.
    #[error("Validation errors: {0}")]
    Validation(FieldErrors),

    /// The requested good does not exist.
    #[error("Goods not found: {0}")]
    GoodsNotFound(GoodsId),

    /// Fewer items are in stock than requested.
    #[error("Insufficient stock for goods {goods_id}: requested {requested}, available {available}")]
    InsufficientStock {
        goods_id: GoodsId,
        requested: u32,
        available: u32,
    },

    /// The customers service answered the deduction with a non-success
    /// response. Carries the upstream body.
    #[error("Failed to deduct balance: {0}")]
    BalanceDeductionFailed(BalanceError),

    /// A dependency's circuit breaker is open; nothing was attempted.
    #[error("Circuit breaker '{dependency}' is open")]
    BreakerOpen { dependency: String },

    /// The customers service could not be reached or timed out.
    #[error("Balance service unavailable: {0}")]
    UpstreamUnavailable(BalanceError),

    /// The caller asked for another user's data.
    #[error("Unauthorized access")]
    Unauthorized,

    /// A later step failed and undoing the balance deduction failed too.
    ///
    /// The user has been charged without a recorded purchase; this needs
    /// manual reconciliation.
    #[error("Compensation failed for {username} on goods {goods_id} ({amount}): {reason}")]
    CompensationFailed {
        username: String,
        goods_id: GoodsId,
        amount: Money,
        reason: String,
    },

    /// The task settling a charged purchase stopped before it finished.
    ///
    /// The wallet may have been charged; this needs manual reconciliation.
    #[error("Purchase settlement interrupted: {0}")]
    Interrupted(String),

    /// Ledger store error.
    #[error("Ledger error: {0}")]
    Ledger(LedgerError),
}

impl PurchaseError {
    /// Returns true if repeating the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PurchaseError::BreakerOpen { .. } | PurchaseError::UpstreamUnavailable(_) => true,
            PurchaseError::Ledger(e) => e.is_unavailable(),
            _ => false,
        }
    }

    /// Short label used as the `outcome` metric value.
    pub fn kind(&self) -> &'static str {
        match self {
            PurchaseError::Validation(_) => "validation",
            PurchaseError::GoodsNotFound(_) => "goods_not_found",
            PurchaseError::InsufficientStock { .. } => "insufficient_stock",
            PurchaseError::BalanceDeductionFailed(_) => "balance_rejected",
            PurchaseError::BreakerOpen { .. } => "breaker_open",
            PurchaseError::UpstreamUnavailable(_) => "upstream_unavailable",
            PurchaseError::Unauthorized => "unauthorized",
            PurchaseError::CompensationFailed { .. } => "compensation_failed",
            PurchaseError::Interrupted(_) => "interrupted",
            PurchaseError::Ledger(_) => "ledger_error",
        }
    }
}

impl From<LedgerError> for PurchaseError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::GoodsNotFound(goods_id) => PurchaseError::GoodsNotFound(goods_id),
            LedgerError::InsufficientStock {
                goods_id,
                requested,
                available,
            } => PurchaseError::InsufficientStock {
                goods_id,
                requested,
                available,
            },
            other => PurchaseError::Ledger(other),
        }
    }
}

/// Convenience type alias for purchase results.
pub type Result<T> = std::result::Result<T, PurchaseError>;
