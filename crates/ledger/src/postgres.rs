use async_trait::async_trait;
use common::{GoodsId, Money, PurchaseId};
use sqlx::{
    PgPool, Row,
    postgres::{PgPoolOptions, PgRow},
};

use crate::{
    Good, LedgerError, NewGood, NewPurchase, Purchase, Result,
    store::{LedgerStore, validate_price},
};

const GOOD_COLUMNS: &str = "id, name, category, price_cents, description, stock_count";
const PURCHASE_COLUMNS: &str =
    "id, username, goods_id, quantity, total_price_cents, purchase_date";

/// PostgreSQL-backed ledger store implementation.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Creates a new PostgreSQL ledger store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `database_url` with a bounded pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_good(row: PgRow) -> Result<Good> {
        let stock: i64 = row.try_get("stock_count")?;
        Ok(Good {
            id: GoodsId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            price_per_item: Money::from_cents(row.try_get("price_cents")?),
            description: row.try_get("description")?,
            stock_count: u32::try_from(stock)
                .map_err(|_| LedgerError::Corrupt(format!("stock_count out of range: {stock}")))?,
        })
    }

    fn row_to_purchase(row: PgRow) -> Result<Purchase> {
        let quantity: i64 = row.try_get("quantity")?;
        Ok(Purchase {
            id: PurchaseId::new(row.try_get("id")?),
            username: row.try_get("username")?,
            goods_id: GoodsId::new(row.try_get("goods_id")?),
            quantity: u32::try_from(quantity)
                .map_err(|_| LedgerError::Corrupt(format!("quantity out of range: {quantity}")))?,
            total_price: Money::from_cents(row.try_get("total_price_cents")?),
            purchase_date: row.try_get("purchase_date")?,
        })
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn insert_good(&self, good: NewGood) -> Result<Good> {
        validate_price(good.price_per_item)?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO goods (name, category, price_cents, description, stock_count)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {GOOD_COLUMNS}
            "#
        ))
        .bind(&good.name)
        .bind(&good.category)
        .bind(good.price_per_item.cents())
        .bind(&good.description)
        .bind(i64::from(good.stock_count))
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_good(row)
    }

    async fn get_good(&self, goods_id: GoodsId) -> Result<Option<Good>> {
        let row = sqlx::query(&format!("SELECT {GOOD_COLUMNS} FROM goods WHERE id = $1"))
            .bind(goods_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_good).transpose()
    }

    async fn update_price(&self, goods_id: GoodsId, price_per_item: Money) -> Result<Good> {
        validate_price(price_per_item)?;

        let row = sqlx::query(&format!(
            "UPDATE goods SET price_cents = $2 WHERE id = $1 RETURNING {GOOD_COLUMNS}"
        ))
        .bind(goods_id.as_i64())
        .bind(price_per_item.cents())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::GoodsNotFound(goods_id))?;

        Self::row_to_good(row)
    }

    async fn decrement_stock(&self, goods_id: GoodsId, quantity: u32) -> Result<Good> {
        // The row lock taken by UPDATE serialises concurrent decrements; the
        // guard in WHERE makes the check and the write a single statement.
        let updated = sqlx::query(&format!(
            r#"
            UPDATE goods SET stock_count = stock_count - $2
            WHERE id = $1 AND stock_count >= $2
            RETURNING {GOOD_COLUMNS}
            "#
        ))
        .bind(goods_id.as_i64())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return Self::row_to_good(row);
        }

        match self.get_good(goods_id).await? {
            Some(good) => Err(LedgerError::InsufficientStock {
                goods_id,
                requested: quantity,
                available: good.stock_count,
            }),
            None => Err(LedgerError::GoodsNotFound(goods_id)),
        }
    }

    async fn restock(&self, goods_id: GoodsId, quantity: u32) -> Result<Good> {
        let row = sqlx::query(&format!(
            "UPDATE goods SET stock_count = stock_count + $2 WHERE id = $1 RETURNING {GOOD_COLUMNS}"
        ))
        .bind(goods_id.as_i64())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::GoodsNotFound(goods_id))?;

        Self::row_to_good(row)
    }

    async fn record_purchase(&self, purchase: NewPurchase) -> Result<Purchase> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO purchases (username, goods_id, quantity, total_price_cents, purchase_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PURCHASE_COLUMNS}
            "#
        ))
        .bind(&purchase.username)
        .bind(purchase.goods_id.as_i64())
        .bind(i64::from(purchase.quantity))
        .bind(purchase.total_price.cents())
        .bind(purchase.purchase_date)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_purchase(row)
    }

    async fn purchases_for_user(&self, username: &str) -> Result<Vec<Purchase>> {
        let rows = sqlx::query(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE username = $1 ORDER BY id ASC"
        ))
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_purchase).collect()
    }
}
