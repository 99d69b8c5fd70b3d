//! Shared types for the sales services.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{GoodsId, PurchaseId};
