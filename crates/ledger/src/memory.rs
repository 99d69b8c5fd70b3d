use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{GoodsId, Money, PurchaseId};
use tokio::sync::RwLock;

use crate::{
    Good, LedgerError, NewGood, NewPurchase, Purchase, Result,
    store::{LedgerStore, validate_price},
};

#[derive(Debug, Default)]
struct LedgerState {
    goods: BTreeMap<GoodsId, Good>,
    purchases: Vec<Purchase>,
    next_goods_id: i64,
    next_purchase_id: i64,
    fail_on_decrement: bool,
    fail_on_record: bool,
}

/// In-memory ledger store implementation for testing and local runs.
///
/// A single write lock guards goods and purchases, so the stock
/// check-and-decrement is serialised per store instance.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedgerStore {
    /// Creates a new empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of recorded purchases.
    pub async fn purchase_count(&self) -> usize {
        self.state.read().await.purchases.len()
    }

    /// Makes subsequent stock decrements fail as if the database were unreachable.
    pub async fn set_fail_on_decrement(&self, fail: bool) {
        self.state.write().await.fail_on_decrement = fail;
    }

    /// Makes subsequent purchase inserts fail as if the database were unreachable.
    pub async fn set_fail_on_record(&self, fail: bool) {
        self.state.write().await.fail_on_record = fail;
    }
}

fn outage() -> LedgerError {
    LedgerError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_good(&self, good: NewGood) -> Result<Good> {
        validate_price(good.price_per_item)?;

        let mut state = self.state.write().await;
        state.next_goods_id += 1;
        let stored = Good {
            id: GoodsId::new(state.next_goods_id),
            name: good.name,
            category: good.category,
            price_per_item: good.price_per_item,
            description: good.description,
            stock_count: good.stock_count,
        };
        state.goods.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_good(&self, goods_id: GoodsId) -> Result<Option<Good>> {
        let state = self.state.read().await;
        Ok(state.goods.get(&goods_id).cloned())
    }

    async fn update_price(&self, goods_id: GoodsId, price_per_item: Money) -> Result<Good> {
        validate_price(price_per_item)?;

        let mut state = self.state.write().await;
        let good = state
            .goods
            .get_mut(&goods_id)
            .ok_or(LedgerError::GoodsNotFound(goods_id))?;
        good.price_per_item = price_per_item;
        Ok(good.clone())
    }

    async fn decrement_stock(&self, goods_id: GoodsId, quantity: u32) -> Result<Good> {
        let mut state = self.state.write().await;
        if state.fail_on_decrement {
            return Err(outage());
        }

        let good = state
            .goods
            .get_mut(&goods_id)
            .ok_or(LedgerError::GoodsNotFound(goods_id))?;

        if good.stock_count < quantity {
            return Err(LedgerError::InsufficientStock {
                goods_id,
                requested: quantity,
                available: good.stock_count,
            });
        }

        good.stock_count -= quantity;
        Ok(good.clone())
    }

    async fn restock(&self, goods_id: GoodsId, quantity: u32) -> Result<Good> {
        let mut state = self.state.write().await;
        let good = state
            .goods
            .get_mut(&goods_id)
            .ok_or(LedgerError::GoodsNotFound(goods_id))?;

        good.stock_count = good
            .stock_count
            .checked_add(quantity)
            .ok_or_else(|| LedgerError::Corrupt(format!("stock overflow for goods {goods_id}")))?;
        Ok(good.clone())
    }

    async fn record_purchase(&self, purchase: NewPurchase) -> Result<Purchase> {
        let mut state = self.state.write().await;
        if state.fail_on_record {
            return Err(outage());
        }

        state.next_purchase_id += 1;
        let stored = Purchase {
            id: PurchaseId::new(state.next_purchase_id),
            username: purchase.username,
            goods_id: purchase.goods_id,
            quantity: purchase.quantity,
            total_price: purchase.total_price,
            purchase_date: purchase.purchase_date,
        };
        state.purchases.push(stored.clone());
        Ok(stored)
    }

    async fn purchases_for_user(&self, username: &str) -> Result<Vec<Purchase>> {
        let state = self.state.read().await;
        Ok(state
            .purchases
            .iter()
            .filter(|p| p.username == username)
            .cloned()
            .collect())
    }
}
