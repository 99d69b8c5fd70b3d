//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sales::PurchaseError;
use serde_json::{Value, json};

use crate::auth::AuthError;

/// API-level error type that maps to HTTP responses.
///
/// Every response body is a JSON object with at least a `message` field.
#[derive(Debug)]
pub enum ApiError {
    /// Missing, malformed or expired bearer token.
    Unauthenticated(AuthError),
    /// The request body was not valid JSON for the endpoint.
    MalformedBody(String),
    /// Purchase flow error.
    Purchase(PurchaseError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthenticated(_) => {
                (StatusCode::UNAUTHORIZED, json!({ "message": "Unauthorized" }))
            }
            ApiError::MalformedBody(detail) => (
                StatusCode::BAD_REQUEST,
                json!({ "message": "Validation errors", "errors": { "body": [detail] } }),
            ),
            ApiError::Purchase(err) => purchase_error_to_response(err),
        };

        (status, axum::Json(body)).into_response()
    }
}

fn purchase_error_to_response(err: PurchaseError) -> (StatusCode, Value) {
    match err {
        PurchaseError::Validation(errors) => (
            StatusCode::BAD_REQUEST,
            json!({ "message": "Validation errors", "errors": errors }),
        ),
        PurchaseError::GoodsNotFound(_) => {
            (StatusCode::NOT_FOUND, json!({ "message": "Goods not found" }))
        }
        PurchaseError::InsufficientStock { .. } => {
            (StatusCode::BAD_REQUEST, json!({ "message": "Insufficient stock" }))
        }
        PurchaseError::BalanceDeductionFailed(e) => (
            StatusCode::BAD_REQUEST,
            json!({
                "message": "Failed to deduct balance",
                "details": e.details().cloned().unwrap_or(Value::Null),
            }),
        ),
        PurchaseError::BreakerOpen { .. } | PurchaseError::UpstreamUnavailable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "message": "Service unavailable", "detail": err.to_string() }),
        ),
        PurchaseError::Unauthorized => {
            (StatusCode::FORBIDDEN, json!({ "message": "Unauthorized access" }))
        }
        PurchaseError::CompensationFailed { .. }
        | PurchaseError::Interrupted(_)
        | PurchaseError::Ledger(_) => {
            tracing::error!(error = %err, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "message": "Internal server error" }),
            )
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthenticated(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedBody(rejection.body_text())
    }
}

impl From<PurchaseError> for ApiError {
    fn from(err: PurchaseError) -> Self {
        ApiError::Purchase(err)
    }
}
