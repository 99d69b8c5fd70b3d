//! Purchase input, field validation and caller identity.

use std::collections::BTreeMap;

use common::GoodsId;
use serde::{Deserialize, Serialize};

const MISSING_FIELD: &str = "Missing data for required field.";
const NOT_POSITIVE: &str = "Must be greater than or equal to 1.";
const QUANTITY_TOO_LARGE: &str = "Quantity is too large.";

/// Validation messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set holding a single message.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Appends a message for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the messages recorded for a field.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(f, "{field}: {}", messages.join(" "))?;
        }
        Ok(())
    }
}

/// A purchase as submitted by the client.
///
/// Both fields are optional so that a missing field is reported as a
/// validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub goods_id: Option<i64>,
    pub quantity: Option<i64>,
}

impl PurchaseRequest {
    pub fn new(goods_id: i64, quantity: i64) -> Self {
        Self {
            goods_id: Some(goods_id),
            quantity: Some(quantity),
        }
    }

    /// Checks required fields and ranges, collecting every problem found.
    pub fn validate(&self) -> Result<ValidatedPurchase, FieldErrors> {
        let mut errors = FieldErrors::new();

        let goods_id = match self.goods_id {
            None => {
                errors.add("goods_id", MISSING_FIELD);
                None
            }
            Some(id) if id < 1 => {
                errors.add("goods_id", NOT_POSITIVE);
                None
            }
            Some(id) => Some(GoodsId::new(id)),
        };

        let quantity = match self.quantity {
            None => {
                errors.add("quantity", MISSING_FIELD);
                None
            }
            Some(q) if q < 1 => {
                errors.add("quantity", NOT_POSITIVE);
                None
            }
            Some(q) => match u32::try_from(q) {
                Ok(q) => Some(q),
                Err(_) => {
                    errors.add("quantity", QUANTITY_TOO_LARGE);
                    None
                }
            },
        };

        match (goods_id, quantity) {
            (Some(goods_id), Some(quantity)) => Ok(ValidatedPurchase { goods_id, quantity }),
            _ => Err(errors),
        }
    }
}

/// A purchase request that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedPurchase {
    pub goods_id: GoodsId,
    pub quantity: u32,
}

/// Bearer credential forwarded to the customers service.
///
/// The token is never printed: `Debug` shows a placeholder.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// The authenticated user on whose behalf an operation runs.
#[derive(Debug, Clone)]
pub struct Caller {
    pub username: String,
    pub token: BearerToken,
}

impl Caller {
    pub fn new(username: impl Into<String>, token: BearerToken) -> Self {
        Self {
            username: username.into(),
            token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        let order = PurchaseRequest::new(7, 3).validate().unwrap();
        assert_eq!(order.goods_id, GoodsId::new(7));
        assert_eq!(order.quantity, 3);
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let errors = PurchaseRequest::default().validate().unwrap_err();
        assert_eq!(errors.get("goods_id").unwrap(), [MISSING_FIELD]);
        assert_eq!(errors.get("quantity").unwrap(), [MISSING_FIELD]);
    }

    #[test]
    fn test_non_positive_quantity() {
        let errors = PurchaseRequest::new(1, 0).validate().unwrap_err();
        assert_eq!(errors.get("quantity").unwrap(), [NOT_POSITIVE]);
        assert!(errors.get("goods_id").is_none());

        assert!(PurchaseRequest::new(1, -4).validate().is_err());
    }

    #[test]
    fn test_quantity_beyond_u32_is_rejected() {
        let errors = PurchaseRequest::new(1, i64::from(u32::MAX) + 1)
            .validate()
            .unwrap_err();
        assert_eq!(errors.get("quantity").unwrap(), [QUANTITY_TOO_LARGE]);
    }

    #[test]
    fn test_field_errors_serialize_as_map() {
        let errors = FieldErrors::single("quantity", NOT_POSITIVE);
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({ "quantity": [NOT_POSITIVE] }));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = BearerToken::new("secret.jwt.value");
        let printed = format!("{:?}", Caller::new("alice", token));
        assert!(!printed.contains("secret"));
        assert!(printed.contains("<redacted>"));
    }
}
