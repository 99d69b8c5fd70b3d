//! Records held by the ledger.

use chrono::{DateTime, Utc};
use common::{GoodsId, Money, PurchaseId};
use serde::{Deserialize, Serialize};

/// A good in the inventory with its current price and stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Good {
    pub id: GoodsId,
    pub name: String,
    pub category: String,
    pub price_per_item: Money,
    pub description: Option<String>,
    pub stock_count: u32,
}

/// Data for inserting a new good.
#[derive(Debug, Clone)]
pub struct NewGood {
    pub name: String,
    pub category: String,
    pub price_per_item: Money,
    pub description: Option<String>,
    pub stock_count: u32,
}

impl NewGood {
    /// Creates a new good without a description.
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        price_per_item: Money,
        stock_count: u32,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            price_per_item,
            description: None,
            stock_count,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A completed purchase.
///
/// `total_price` is the price snapshot taken at purchase time; later price
/// changes on the good never alter it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub username: String,
    pub goods_id: GoodsId,
    pub quantity: u32,
    pub total_price: Money,
    pub purchase_date: DateTime<Utc>,
}

/// Data for recording a purchase.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub username: String,
    pub goods_id: GoodsId,
    pub quantity: u32,
    pub total_price: Money,
    pub purchase_date: DateTime<Utc>,
}
