//! Purchase orchestrator: the multi-step purchase with compensation.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use breaker::{BreakerError, CircuitBreaker};
use chrono::Utc;
use common::{GoodsId, Money};
use ledger::{LedgerError, LedgerStore, NewPurchase, Purchase};
use tracing::Instrument;

use crate::error::PurchaseError;
use crate::request::{Caller, FieldErrors, PurchaseRequest};
use crate::services::{BalanceError, BalanceService};

/// Orchestrator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Upper bound on each call to the customers service.
    pub balance_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            balance_timeout: Duration::from_secs(5),
        }
    }
}

/// Runs purchases against a ledger and the customers service.
///
/// A purchase validates the request, checks stock, deducts the total from the
/// caller's wallet, decrements stock and records the purchase. Calls to the
/// customers service go through `balance_breaker`; ledger calls go through
/// `ledger_breaker`. When stock decrement or purchase recording fails after
/// the wallet was charged, the charge is refunded (and stock restored if it
/// was already taken) before the original error is returned.
///
/// Everything from the deduction onwards runs on a spawned task, so dropping
/// the `purchase` future does not abandon a charged wallet.
pub struct PurchaseOrchestrator<L, B>
where
    L: LedgerStore,
    B: BalanceService,
{
    inner: Arc<Inner<L, B>>,
}

struct Inner<L, B> {
    ledger: L,
    balance: B,
    balance_breaker: CircuitBreaker,
    ledger_breaker: CircuitBreaker,
    config: OrchestratorConfig,
}

impl<L, B> PurchaseOrchestrator<L, B>
where
    L: LedgerStore + 'static,
    B: BalanceService + 'static,
{
    pub fn new(
        ledger: L,
        balance: B,
        balance_breaker: CircuitBreaker,
        ledger_breaker: CircuitBreaker,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                ledger,
                balance,
                balance_breaker,
                ledger_breaker,
                config,
            }),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.inner.ledger
    }

    pub fn balance(&self) -> &B {
        &self.inner.balance
    }

    pub fn balance_breaker(&self) -> &CircuitBreaker {
        &self.inner.balance_breaker
    }

    pub fn ledger_breaker(&self) -> &CircuitBreaker {
        &self.inner.ledger_breaker
    }

    /// Places a purchase for the caller.
    ///
    /// On success the recorded purchase carries the total computed from the
    /// price at the time of purchase.
    #[tracing::instrument(skip(self, caller), fields(username = %caller.username))]
    pub async fn purchase(
        &self,
        caller: &Caller,
        request: PurchaseRequest,
    ) -> Result<Purchase, PurchaseError> {
        let start = Instant::now();
        let result = self.run_purchase(caller, request).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::counter!("purchases_total", "outcome" => outcome).increment(1);
        metrics::histogram!("purchase_duration_seconds").record(start.elapsed().as_secs_f64());

        match &result {
            Ok(purchase) => tracing::info!(
                purchase_id = %purchase.id,
                goods_id = %purchase.goods_id,
                quantity = purchase.quantity,
                total_price = %purchase.total_price,
                "purchase recorded"
            ),
            Err(PurchaseError::CompensationFailed { .. } | PurchaseError::Interrupted(_)) => {}
            Err(e) => tracing::warn!(error = %e, outcome, "purchase failed"),
        }
        result
    }

    async fn run_purchase(
        &self,
        caller: &Caller,
        request: PurchaseRequest,
    ) -> Result<Purchase, PurchaseError> {
        // 1. Validate
        let order = request.validate().map_err(PurchaseError::Validation)?;
        let goods_id = order.goods_id;
        let quantity = order.quantity;

        // 2. Look up the good
        let good = self
            .inner
            .ledger
            .get_good(goods_id)
            .await?
            .ok_or(PurchaseError::GoodsNotFound(goods_id))?;

        // 3. Pre-check stock so a hopeless request never touches the wallet
        if good.stock_count < quantity {
            return Err(PurchaseError::InsufficientStock {
                goods_id,
                requested: quantity,
                available: good.stock_count,
            });
        }

        // 4. Price snapshot
        let total_price = good.price_per_item.multiply(quantity).ok_or_else(|| {
            PurchaseError::Validation(FieldErrors::single(
                "quantity",
                "Total price is out of range.",
            ))
        })?;

        // The ledger writes would be refused, so do not charge the wallet
        if !self.inner.ledger_breaker.allows_calls() {
            metrics::counter!("circuit_breaker_rejections_total", "breaker" => self.inner.ledger_breaker.name().to_string())
                .increment(1);
            return Err(PurchaseError::BreakerOpen {
                dependency: self.inner.ledger_breaker.name().to_string(),
            });
        }

        // 5-7. Charge, take stock and record on a task the caller cannot cancel
        let inner = Arc::clone(&self.inner);
        let owner = caller.clone();
        let settlement = tokio::spawn(
            async move { inner.settle(&owner, goods_id, quantity, total_price).await }
                .in_current_span(),
        );

        match settlement.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    %goods_id,
                    %total_price,
                    quantity,
                    error = %e,
                    "purchase settlement did not complete; wallet may be charged"
                );
                Err(PurchaseError::Interrupted(e.to_string()))
            }
        }
    }

    /// Returns the purchases of `username`, which must be the caller.
    #[tracing::instrument(skip(self, caller), fields(caller = %caller.username))]
    pub async fn history(
        &self,
        caller: &Caller,
        username: &str,
    ) -> Result<Vec<Purchase>, PurchaseError> {
        if caller.username != username {
            tracing::warn!("purchase history requested for another user");
            return Err(PurchaseError::Unauthorized);
        }
        Ok(self.inner.ledger.purchases_for_user(username).await?)
    }
}

impl<L, B> Inner<L, B>
where
    L: LedgerStore,
    B: BalanceService,
{
    async fn settle(
        &self,
        caller: &Caller,
        goods_id: GoodsId,
        quantity: u32,
        total_price: Money,
    ) -> Result<Purchase, PurchaseError> {
        // 5. Charge the wallet
        self.deduct(caller, total_price).await?;

        // 6. Take the stock; the store re-checks availability atomically
        if let Err(e) = self
            .guard_ledger(|| self.ledger.decrement_stock(goods_id, quantity))
            .await
        {
            self.compensate(caller, goods_id, quantity, total_price, false)
                .await?;
            return Err(e);
        }

        // 7. Record the purchase
        let new_purchase = NewPurchase {
            username: caller.username.clone(),
            goods_id,
            quantity,
            total_price,
            purchase_date: Utc::now(),
        };
        match self
            .guard_ledger(|| self.ledger.record_purchase(new_purchase))
            .await
        {
            Ok(purchase) => Ok(purchase),
            Err(e) => {
                self.compensate(caller, goods_id, quantity, total_price, true)
                    .await?;
                Err(e)
            }
        }
    }

    /// Deducts through the balance breaker. Outages and 5xx answers count as
    /// breaker failures, but only a missing answer is reported as
    /// `UpstreamUnavailable`; any HTTP-level answer is a failed deduction.
    async fn deduct(&self, caller: &Caller, amount: Money) -> Result<(), PurchaseError> {
        let result = self
            .balance_breaker
            .call_with(
                || self.with_timeout(self.balance.deduct(&caller.username, amount, &caller.token)),
                BalanceError::is_transient,
            )
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(BreakerError::Open { name }) => Err(PurchaseError::BreakerOpen { dependency: name }),
            Err(BreakerError::Inner(e)) if e.is_connection_failure() => {
                Err(PurchaseError::UpstreamUnavailable(e))
            }
            Err(BreakerError::Inner(e)) => Err(PurchaseError::BalanceDeductionFailed(e)),
        }
    }

    async fn with_timeout<F>(&self, call: F) -> Result<(), BalanceError>
    where
        F: Future<Output = Result<(), BalanceError>>,
    {
        tokio::time::timeout(self.config.balance_timeout, call)
            .await
            .unwrap_or(Err(BalanceError::Timeout))
    }

    /// Runs a ledger call through the ledger breaker. Only outages count as
    /// breaker failures; stock and lookup rejections do not.
    async fn guard_ledger<T, F, Fut>(&self, op: F) -> Result<T, PurchaseError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        self.ledger_breaker
            .call_with(op, LedgerError::is_unavailable)
            .await
            .map_err(|e| match e {
                BreakerError::Open { name } => PurchaseError::BreakerOpen { dependency: name },
                BreakerError::Inner(e) => e.into(),
            })
    }

    /// Undoes the wallet charge, and the stock decrement when `restock` is
    /// set. Refunds bypass the balance breaker but keep the timeout.
    #[tracing::instrument(skip(self, caller), fields(username = %caller.username))]
    async fn compensate(
        &self,
        caller: &Caller,
        goods_id: GoodsId,
        quantity: u32,
        amount: Money,
        restock: bool,
    ) -> Result<(), PurchaseError> {
        let mut failures = Vec::new();

        if restock {
            if let Err(e) = self.ledger.restock(goods_id, quantity).await {
                failures.push(format!("restock failed: {e}"));
            }
        }

        if let Err(e) = self
            .with_timeout(self.balance.refund(&caller.username, amount, &caller.token))
            .await
        {
            failures.push(format!("refund failed: {e}"));
        }

        if failures.is_empty() {
            metrics::counter!("purchase_compensations_total", "result" => "ok").increment(1);
            tracing::info!(%goods_id, %amount, restock, "purchase compensated");
            return Ok(());
        }

        let reason = failures.join("; ");
        metrics::counter!("purchase_compensations_total", "result" => "failed").increment(1);
        tracing::error!(
            %goods_id,
            %amount,
            quantity,
            reason = %reason,
            "compensation failed; wallet charged without a recorded purchase"
        );
        Err(PurchaseError::CompensationFailed {
            username: caller.username.clone(),
            goods_id,
            amount,
            reason,
        })
    }
}
