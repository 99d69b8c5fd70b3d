//! Bearer token authentication.
//!
//! Tokens are HS256 JWTs issued by the customers service. The username is
//! the `sub` claim, and `exp` is mandatory. The raw token is kept so it can
//! be forwarded to the customers service on the caller's behalf.

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use sales::{BearerToken, Caller};
use serde::Deserialize;
use thiserror::Error;

use crate::error::ApiError;

/// Reasons a request failed authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,

    #[error("Authorization header is not a bearer token")]
    InvalidScheme,

    #[error("token has expired")]
    Expired,

    #[error("invalid token: {0}")]
    InvalidToken(String),
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

/// Verifies HS256 bearer tokens against a shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    inner: Arc<VerifierInner>,
}

struct VerifierInner {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.validate_exp = true;
        validation.validate_aud = false;

        Self {
            inner: Arc::new(VerifierInner {
                key: DecodingKey::from_secret(secret),
                validation,
            }),
        }
    }

    /// Verifies the signature and expiry, returning the username.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        let data = decode::<Claims>(token, &self.inner.key, &self.inner.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            },
        )?;

        if data.claims.sub.is_empty() {
            return Err(AuthError::InvalidToken("empty subject".to_string()));
        }
        Ok(data.claims.sub)
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithms", &self.inner.validation.algorithms)
            .finish_non_exhaustive()
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let value = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidScheme)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::InvalidScheme)?;
    if !scheme.eq_ignore_ascii_case("Bearer") || token.trim().is_empty() {
        return Err(AuthError::InvalidScheme);
    }
    Ok(token.trim())
}

/// The verified caller of a request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub username: String,
    pub token: BearerToken,
}

impl AuthenticatedUser {
    pub fn into_caller(self) -> Caller {
        Caller::new(self.username, self.token)
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    TokenVerifier: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).inspect_err(|e| {
            tracing::warn!(uri = %parts.uri, error = %e, "rejected request without bearer token");
        })?;

        let verifier = TokenVerifier::from_ref(state);
        let username = verifier.verify(token).inspect_err(|e| {
            metrics::counter!("auth_failures_total").increment(1);
            tracing::warn!(uri = %parts.uri, error = %e, "JWT validation failed");
        })?;

        Ok(Self {
            username,
            token: BearerToken::new(token),
        })
    }
}
