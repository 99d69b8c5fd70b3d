//! Ledger store for goods stock and purchase records.
//!
//! Provides the [`LedgerStore`] trait with an in-memory implementation for
//! tests and local runs, and a PostgreSQL implementation for production.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use error::{LedgerError, Result};
pub use memory::InMemoryLedgerStore;
pub use model::{Good, NewGood, NewPurchase, Purchase};
pub use postgres::PostgresLedgerStore;
pub use store::LedgerStore;
