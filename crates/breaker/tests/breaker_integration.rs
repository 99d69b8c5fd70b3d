//! Integration tests for the circuit breaker under concurrent callers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use breaker::{BreakerConfig, BreakerError, BreakerState, CircuitBreaker};
use tokio::sync::oneshot;

#[derive(Debug)]
struct Unreachable;

async fn trip(breaker: &CircuitBreaker) {
    for _ in 0..breaker.config().failure_threshold {
        let _ = breaker
            .call(|| async { Err::<(), _>(Unreachable) })
            .await;
    }
    assert_eq!(breaker.state(), BreakerState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_exactly_one_trial_while_half_open() {
    let breaker = CircuitBreaker::new(
        "customers",
        BreakerConfig::new(3, Duration::from_secs(60)),
    );
    trip(&breaker).await;
    tokio::time::advance(Duration::from_secs(60)).await;

    let (release_tx, release_rx) = oneshot::channel::<()>();
    let invoked = Arc::new(AtomicUsize::new(0));

    let trial = {
        let breaker = breaker.clone();
        let invoked = invoked.clone();
        tokio::spawn(async move {
            breaker
                .call(|| async move {
                    invoked.fetch_add(1, Ordering::SeqCst);
                    let _ = release_rx.await;
                    Ok::<_, Unreachable>("recovered")
                })
                .await
        })
    };

    // Let the trial claim the half-open slot.
    tokio::task::yield_now().await;
    assert_eq!(breaker.state(), BreakerState::HalfOpen);

    let mut rejected = 0;
    for _ in 0..5 {
        let invoked = invoked.clone();
        let result = breaker
            .call(|| async move {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Unreachable>("should not run")
            })
            .await;
        if matches!(result, Err(BreakerError::Open { .. })) {
            rejected += 1;
        }
    }
    assert_eq!(rejected, 5);
    assert_eq!(invoked.load(Ordering::SeqCst), 1);

    release_tx.send(()).unwrap();
    assert_eq!(trial.await.unwrap().unwrap(), "recovered");
    assert_eq!(breaker.state(), BreakerState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_failures_open_once() {
    let breaker = CircuitBreaker::new(
        "customers",
        BreakerConfig::new(3, Duration::from_secs(30)),
    );

    let mut handles = Vec::new();
    for _ in 0..10 {
        let breaker = breaker.clone();
        handles.push(tokio::spawn(async move {
            breaker
                .call(|| async { Err::<(), _>(Unreachable) })
                .await
        }));
    }

    let mut open_rejections = 0;
    let mut inner_failures = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Err(BreakerError::Open { .. }) => open_rejections += 1,
            Err(BreakerError::Inner(_)) => inner_failures += 1,
            Ok(()) => unreachable!("operation always fails"),
        }
    }

    assert!(inner_failures >= 3);
    assert_eq!(open_rejections + inner_failures, 10);
    assert_eq!(breaker.state(), BreakerState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_breakers_are_independent() {
    let customers = CircuitBreaker::new("customers", BreakerConfig::new(1, Duration::from_secs(30)));
    let ledger = CircuitBreaker::new("ledger", BreakerConfig::new(1, Duration::from_secs(30)));

    trip(&customers).await;

    assert_eq!(ledger.state(), BreakerState::Closed);
    assert!(ledger.call(|| async { Ok::<_, Unreachable>(()) }).await.is_ok());
}
