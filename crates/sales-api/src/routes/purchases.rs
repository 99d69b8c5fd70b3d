//! Purchase and purchase history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRef, Path, State};
use axum::http::StatusCode;
use ledger::{LedgerStore, Purchase};
use sales::{BalanceService, PurchaseOrchestrator, PurchaseRequest};
use serde::Serialize;

use crate::auth::{AuthenticatedUser, TokenVerifier};
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<L: LedgerStore, B: BalanceService> {
    pub orchestrator: PurchaseOrchestrator<L, B>,
    pub verifier: TokenVerifier,
}

impl<L, B> FromRef<Arc<AppState<L, B>>> for TokenVerifier
where
    L: LedgerStore,
    B: BalanceService,
{
    fn from_ref(state: &Arc<AppState<L, B>>) -> Self {
        state.verifier.clone()
    }
}

// -- Response types --

#[derive(Serialize)]
pub struct PurchaseResponse {
    pub message: &'static str,
    pub purchase: Purchase,
}

#[derive(Serialize)]
pub struct PurchaseHistoryResponse {
    pub purchase_history: Vec<Purchase>,
}

// -- Handlers --

/// POST /purchase: buy `quantity` items of `goods_id` as the authenticated user.
#[tracing::instrument(skip(state, user, body), fields(username = %user.username))]
pub async fn create<L, B>(
    State(state): State<Arc<AppState<L, B>>>,
    user: AuthenticatedUser,
    body: Result<Json<PurchaseRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PurchaseResponse>), ApiError>
where
    L: LedgerStore + 'static,
    B: BalanceService + 'static,
{
    let Json(request) = body?;
    let purchase = state
        .orchestrator
        .purchase(&user.into_caller(), request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PurchaseResponse {
            message: "Purchase successful",
            purchase,
        }),
    ))
}

/// GET /purchase-history/{username}: the caller's own purchases, oldest first.
#[tracing::instrument(skip(state, user), fields(caller = %user.username))]
pub async fn history<L, B>(
    State(state): State<Arc<AppState<L, B>>>,
    user: AuthenticatedUser,
    Path(username): Path<String>,
) -> Result<Json<PurchaseHistoryResponse>, ApiError>
where
    L: LedgerStore + 'static,
    B: BalanceService + 'static,
{
    let purchase_history = state
        .orchestrator
        .history(&user.into_caller(), &username)
        .await?;

    Ok(Json(PurchaseHistoryResponse { purchase_history }))
}
