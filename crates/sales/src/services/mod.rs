//! Customers service access: the wallet trait, an HTTP client and an
//! in-memory double.

pub mod balance;
pub mod http_balance;

pub use balance::{BalanceError, BalanceService, InMemoryBalanceService};
pub use http_balance::HttpBalanceClient;
