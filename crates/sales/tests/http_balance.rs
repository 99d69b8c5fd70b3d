//! HTTP balance client against a stub customers service.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use common::Money;
use reqwest::Url;
use breaker::{BreakerConfig, CircuitBreaker};
use ledger::{InMemoryLedgerStore, LedgerStore, NewGood};
use sales::{
    BalanceError, BalanceService, BearerToken, Caller, HttpBalanceClient, OrchestratorConfig,
    PurchaseError, PurchaseOrchestrator, PurchaseRequest,
};
use serde_json::{Value, json};

#[derive(Clone, Default)]
struct Recorded {
    requests: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
}

impl Recorded {
    fn push(&self, path: &str, headers: &HeaderMap, body: &Value) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests
            .lock()
            .unwrap()
            .push((path.to_string(), auth, body.clone()));
    }

    fn all(&self) -> Vec<(String, Option<String>, Value)> {
        self.requests.lock().unwrap().clone()
    }
}

async fn deduct(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    recorded.push("deduct", &headers, &body);
    match body["username"].as_str().unwrap_or_default() {
        "alice" => (
            StatusCode::OK,
            json!({ "message": "Balance deducted" }).to_string(),
        ),
        "broke" => (
            StatusCode::BAD_REQUEST,
            json!({ "message": "Insufficient wallet balance" }).to_string(),
        ),
        "ghost" => (
            StatusCode::NOT_FOUND,
            json!({ "message": "Customer not found" }).to_string(),
        ),
        "carol" => (StatusCode::NO_CONTENT, String::new()),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            (StatusCode::OK, String::new())
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "database is down".to_string()),
    }
}

async fn add_balance(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    recorded.push("add", &headers, &body);
    StatusCode::OK
}

async fn spawn_stub() -> (Url, Recorded) {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/customers/deduct-balance", post(deduct))
        .route("/customers/add-balance", post(add_balance))
        .with_state(recorded.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (Url::parse(&format!("http://{addr}")).unwrap(), recorded)
}

fn client(base: Url) -> HttpBalanceClient {
    HttpBalanceClient::new(base, Duration::from_millis(500)).unwrap()
}

fn token() -> BearerToken {
    BearerToken::new("abc.def.ghi")
}

#[tokio::test]
async fn test_deduct_forwards_token_and_amount() {
    let (base, recorded) = spawn_stub().await;

    client(base)
        .deduct("alice", Money::from_cents(99_999), &token())
        .await
        .unwrap();

    let requests = recorded.all();
    assert_eq!(requests.len(), 1);
    let (path, auth, body) = &requests[0];
    assert_eq!(path, "deduct");
    assert_eq!(auth.as_deref(), Some("Bearer abc.def.ghi"));
    assert_eq!(body, &json!({ "username": "alice", "amount": 999.99 }));
}

#[tokio::test]
async fn test_refund_posts_to_add_balance() {
    let (base, recorded) = spawn_stub().await;

    client(base)
        .refund("alice", Money::from_cents(500), &token())
        .await
        .unwrap();

    let requests = recorded.all();
    assert_eq!(requests[0].0, "add");
    assert_eq!(requests[0].2["amount"], json!(5.0));
}

#[tokio::test]
async fn test_business_rejections() {
    let (base, _) = spawn_stub().await;
    let client = client(base);

    let err = client
        .deduct("broke", Money::from_cents(100), &token())
        .await
        .unwrap_err();
    assert!(matches!(err, BalanceError::InsufficientFunds { .. }));
    assert_eq!(err.details().unwrap()["message"], "Insufficient wallet balance");
    assert!(!err.is_transient());

    let err = client
        .deduct("ghost", Money::from_cents(100), &token())
        .await
        .unwrap_err();
    assert!(matches!(err, BalanceError::UserNotFound { .. }));
}

#[tokio::test]
async fn test_any_success_status_is_accepted() {
    let (base, recorded) = spawn_stub().await;

    client(base)
        .deduct("carol", Money::from_cents(100), &token())
        .await
        .unwrap();
    assert_eq!(recorded.all().len(), 1);
}

#[tokio::test]
async fn test_server_error_is_an_answer_not_an_outage() {
    let (base, _) = spawn_stub().await;

    let err = client(base)
        .deduct("crash", Money::from_cents(100), &token())
        .await
        .unwrap_err();

    match &err {
        BalanceError::Rejected { status, details } => {
            assert_eq!(*status, 500);
            assert_eq!(details, &json!({ "message": "database is down" }));
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
    assert!(!err.is_connection_failure());
}

#[tokio::test]
async fn test_server_error_fails_the_purchase_with_upstream_body() {
    let (base, _) = spawn_stub().await;
    let ledger = InMemoryLedgerStore::new();
    let good = ledger
        .insert_good(NewGood::new("Laptop", "electronics", Money::from_cents(99_999), 5))
        .await
        .unwrap();
    let orch = PurchaseOrchestrator::new(
        ledger.clone(),
        client(base),
        CircuitBreaker::new("customers", BreakerConfig::default()),
        CircuitBreaker::new("ledger", BreakerConfig::default()),
        OrchestratorConfig::default(),
    );

    let err = orch
        .purchase(
            &Caller::new("crash", token()),
            PurchaseRequest::new(good.id.as_i64(), 1),
        )
        .await
        .unwrap_err();

    match &err {
        PurchaseError::BalanceDeductionFailed(e) => {
            assert_eq!(e.details().unwrap()["message"], "database is down");
        }
        other => panic!("expected BalanceDeductionFailed, got {other:?}"),
    }
    assert_eq!(ledger.get_good(good.id).await.unwrap().unwrap().stock_count, 5);
}

#[tokio::test]
async fn test_slow_service_times_out() {
    let (base, _) = spawn_stub().await;

    let err = client(base)
        .deduct("slow", Money::from_cents(100), &token())
        .await
        .unwrap_err();
    assert!(matches!(err, BalanceError::Timeout));
}

#[tokio::test]
async fn test_unreachable_service() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let base = Url::parse(&format!("http://{addr}")).unwrap();
    let err = client(base)
        .deduct("alice", Money::from_cents(100), &token())
        .await
        .unwrap_err();
    assert!(matches!(err, BalanceError::Unavailable(_)));
    assert!(err.is_connection_failure());
}
