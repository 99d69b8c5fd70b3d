//! Reqwest-backed client for the customers service wallet endpoints.

use std::time::Duration;

use async_trait::async_trait;
use common::Money;
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use serde_json::{Value, json};

use super::balance::{BalanceError, BalanceService};
use crate::request::BearerToken;

const DEDUCT_PATH: &str = "customers/deduct-balance";
const REFUND_PATH: &str = "customers/add-balance";

#[derive(Debug, Serialize)]
struct WalletRequest<'a> {
    username: &'a str,
    amount: Money,
}

/// Balance service that talks to the customers service over HTTP.
///
/// The caller's bearer token is forwarded on every request.
#[derive(Debug, Clone)]
pub struct HttpBalanceClient {
    client: Client,
    base_url: Url,
}

impl HttpBalanceClient {
    /// Builds a client whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: with_trailing_slash(base_url),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn post_wallet(
        &self,
        path: &str,
        username: &str,
        amount: Money,
        token: &BearerToken,
    ) -> Result<(), BalanceError> {
        let endpoint = self
            .base_url
            .join(path)
            .map_err(|e| BalanceError::Unavailable(format!("invalid endpoint {path}: {e}")))?;

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(token.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&WalletRequest { username, amount })
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.bytes().await.map_err(map_transport_error)?;
        Err(map_status_error(status, body.as_ref()))
    }
}

#[async_trait]
impl BalanceService for HttpBalanceClient {
    #[tracing::instrument(skip(self, token))]
    async fn deduct(
        &self,
        username: &str,
        amount: Money,
        token: &BearerToken,
    ) -> Result<(), BalanceError> {
        self.post_wallet(DEDUCT_PATH, username, amount, token).await
    }

    #[tracing::instrument(skip(self, token))]
    async fn refund(
        &self,
        username: &str,
        amount: Money,
        token: &BearerToken,
    ) -> Result<(), BalanceError> {
        self.post_wallet(REFUND_PATH, username, amount, token).await
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn map_transport_error(error: reqwest::Error) -> BalanceError {
    if error.is_timeout() {
        BalanceError::Timeout
    } else {
        BalanceError::Unavailable(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> BalanceError {
    let details = serde_json::from_slice::<Value>(body)
        .unwrap_or_else(|_| json!({ "message": String::from_utf8_lossy(body) }));

    match status {
        StatusCode::NOT_FOUND => BalanceError::UserNotFound { details },
        StatusCode::BAD_REQUEST if mentions_insufficient(&details) => {
            BalanceError::InsufficientFunds { details }
        }
        _ => BalanceError::Rejected {
            status: status.as_u16(),
            details,
        },
    }
}

fn mentions_insufficient(details: &Value) -> bool {
    details
        .get("message")
        .and_then(Value::as_str)
        .is_some_and(|message| message.to_ascii_lowercase().contains("insufficient"))
}
