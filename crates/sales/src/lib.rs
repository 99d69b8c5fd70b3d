//! Purchase orchestration for the sales service.
//!
//! A purchase runs these steps:
//! 1. Validate the request
//! 2. Look up the good and pre-check stock
//! 3. Deduct the total from the caller's wallet on the customers service
//! 4. Atomically decrement stock
//! 5. Record the purchase with its price snapshot
//!
//! If step 4 or 5 fails after the wallet was charged, the charge is refunded
//! and any decremented stock is restored. Steps 3 to 5 run on a spawned task,
//! so a client that disconnects mid-purchase cannot leave the wallet charged.

pub mod error;
pub mod orchestrator;
pub mod request;
pub mod services;

pub use error::PurchaseError;
pub use orchestrator::{OrchestratorConfig, PurchaseOrchestrator};
pub use request::{BearerToken, Caller, FieldErrors, PurchaseRequest, ValidatedPurchase};
pub use services::{BalanceError, BalanceService, HttpBalanceClient, InMemoryBalanceService};
