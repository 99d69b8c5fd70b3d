//! HTTP API for the sales service.
//!
//! Exposes purchase and purchase-history endpoints behind bearer token
//! authentication, with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use breaker::CircuitBreaker;
use ledger::LedgerStore;
use metrics_exporter_prometheus::PrometheusHandle;
use sales::{BalanceService, PurchaseOrchestrator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::TokenVerifier;
use config::Config;
use routes::purchases::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<L, B>(state: Arc<AppState<L, B>>, metrics_handle: PrometheusHandle) -> Router
where
    L: LedgerStore + 'static,
    B: BalanceService + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/purchase", post(routes::purchases::create::<L, B>))
        .route(
            "/purchase-history/{username}",
            get(routes::purchases::history::<L, B>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state: one breaker per dependency around a
/// purchase orchestrator, and a token verifier for the configured secret.
pub fn create_state<L, B>(ledger: L, balance: B, config: &Config) -> Arc<AppState<L, B>>
where
    L: LedgerStore + 'static,
    B: BalanceService + 'static,
{
    let breaker_config = config.breaker_config();
    let orchestrator = PurchaseOrchestrator::new(
        ledger,
        balance,
        CircuitBreaker::new("customers", breaker_config),
        CircuitBreaker::new("ledger", breaker_config),
        config.orchestrator_config(),
    );

    Arc::new(AppState {
        orchestrator,
        verifier: TokenVerifier::new(config.jwt_secret.as_bytes()),
    })
}
