use std::time::Duration;

use breaker::{BreakerConfig, CircuitBreaker};
use common::Money;
use criterion::{Criterion, criterion_group, criterion_main};
use ledger::{InMemoryLedgerStore, LedgerStore, NewGood};
use sales::{
    BearerToken, Caller, InMemoryBalanceService, OrchestratorConfig, PurchaseOrchestrator,
    PurchaseRequest,
};

fn orchestrator(
    ledger: InMemoryLedgerStore,
    balance: InMemoryBalanceService,
) -> PurchaseOrchestrator<InMemoryLedgerStore, InMemoryBalanceService> {
    PurchaseOrchestrator::new(
        ledger,
        balance,
        CircuitBreaker::new("customers", BreakerConfig::default()),
        CircuitBreaker::new("ledger", BreakerConfig::default()),
        OrchestratorConfig::default(),
    )
}

fn bench_successful_purchase(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = InMemoryLedgerStore::new();
    let balance = InMemoryBalanceService::new().with_balance("alice", Money::from_cents(i64::MAX));
    let id = rt.block_on(async {
        ledger
            .insert_good(NewGood::new(
                "Pen",
                "stationery",
                Money::from_cents(150),
                u32::MAX,
            ))
            .await
            .unwrap()
            .id
    });
    let orch = orchestrator(ledger, balance);
    let caller = Caller::new("alice", BearerToken::new("bench"));

    c.bench_function("sales/purchase_success", |b| {
        b.iter(|| {
            rt.block_on(async {
                orch.purchase(&caller, PurchaseRequest::new(id.as_i64(), 1))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_breaker_rejection(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = InMemoryLedgerStore::new();
    let balance = InMemoryBalanceService::new().with_balance("alice", Money::from_cents(1_000));
    balance.set_unavailable(true);
    let id = rt.block_on(async {
        ledger
            .insert_good(NewGood::new("Pen", "stationery", Money::from_cents(150), 10))
            .await
            .unwrap()
            .id
    });
    let orch = PurchaseOrchestrator::new(
        ledger,
        balance,
        CircuitBreaker::new("customers", BreakerConfig::new(1, Duration::from_secs(3600))),
        CircuitBreaker::new("ledger", BreakerConfig::default()),
        OrchestratorConfig::default(),
    );
    let caller = Caller::new("alice", BearerToken::new("bench"));
    rt.block_on(async {
        let _ = orch
            .purchase(&caller, PurchaseRequest::new(id.as_i64(), 1))
            .await;
    });

    c.bench_function("sales/purchase_breaker_open", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = orch
                    .purchase(&caller, PurchaseRequest::new(id.as_i64(), 1))
                    .await;
                assert!(result.is_err());
            });
        });
    });
}

criterion_group!(benches, bench_successful_purchase, bench_breaker_rejection);
criterion_main!(benches);
