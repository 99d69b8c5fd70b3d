use common::{GoodsId, Money};
use thiserror::Error;

/// Errors that can occur when interacting with the ledger store.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The referenced good does not exist.
    #[error("Goods not found: {0}")]
    GoodsNotFound(GoodsId),

    /// A conditional stock decrement found fewer items than requested.
    #[error("Insufficient stock for goods {goods_id}: requested {requested}, available {available}")]
    InsufficientStock {
        goods_id: GoodsId,
        requested: u32,
        available: u32,
    },

    /// A price must be strictly positive.
    #[error("Invalid price: {0}")]
    InvalidPrice(Money),

    /// A stored row violates a domain invariant.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl LedgerError {
    /// Returns true if the error means the store itself could not be reached,
    /// as opposed to a rejected operation.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, LedgerError::Database(_))
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
