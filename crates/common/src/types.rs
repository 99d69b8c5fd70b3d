use serde::{Deserialize, Serialize};

/// Identifier of a good in the inventory.
///
/// Goods are keyed by the integer primary key the inventory service assigns,
/// which is also what clients send as `goods_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoodsId(i64);

impl GoodsId {
    /// Creates a goods ID from its raw value.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw integer value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for GoodsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for GoodsId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<GoodsId> for i64 {
    fn from(id: GoodsId) -> Self {
        id.0
    }
}

/// Identifier of a recorded purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseId(i64);

impl PurchaseId {
    /// Creates a purchase ID from its raw value.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw integer value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for PurchaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PurchaseId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goods_id_preserves_value() {
        let id = GoodsId::new(42);
        assert_eq!(id.as_i64(), 42);
        assert_eq!(i64::from(id), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn ids_serialize_as_bare_integers() {
        let json = serde_json::to_string(&GoodsId::new(7)).unwrap();
        assert_eq!(json, "7");

        let id: PurchaseId = serde_json::from_str("13").unwrap();
        assert_eq!(id, PurchaseId::new(13));
    }
}
