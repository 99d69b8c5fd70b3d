use async_trait::async_trait;
use common::{GoodsId, Money};

use crate::{Good, NewGood, NewPurchase, Purchase, Result};

/// Core trait for ledger store implementations.
///
/// The ledger holds goods stock counts and purchase records.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts a new good and returns it with its assigned ID.
    ///
    /// Fails with `InvalidPrice` if the price is not positive.
    async fn insert_good(&self, good: NewGood) -> Result<Good>;

    /// Retrieves a good by ID.
    ///
    /// Returns None if the good doesn't exist.
    async fn get_good(&self, goods_id: GoodsId) -> Result<Option<Good>>;

    /// Changes the price of a good. Recorded purchases are unaffected.
    async fn update_price(&self, goods_id: GoodsId, price_per_item: Money) -> Result<Good>;

    /// Atomically decrements stock if at least `quantity` items are available.
    ///
    /// The check and the write happen as one step: two concurrent decrements
    /// against the same good can never take the stock below zero. Fails with
    /// `InsufficientStock` if too few items remain.
    async fn decrement_stock(&self, goods_id: GoodsId, quantity: u32) -> Result<Good>;

    /// Adds `quantity` items back to stock.
    async fn restock(&self, goods_id: GoodsId, quantity: u32) -> Result<Good>;

    /// Records a purchase and returns it with its assigned ID.
    async fn record_purchase(&self, purchase: NewPurchase) -> Result<Purchase>;

    /// Retrieves all purchases for a user in insertion order.
    async fn purchases_for_user(&self, username: &str) -> Result<Vec<Purchase>>;
}

/// Validates a price before it is written.
pub fn validate_price(price: Money) -> Result<()> {
    if !price.is_positive() {
        return Err(crate::LedgerError::InvalidPrice(price));
    }
    Ok(())
}
