//! Persisted payload format.
//!
//! The whole cart is stored as one JSON array of line items under a single
//! storage key:
//!
//! ```json
//! [{"id":"a","title":"T","imageUrl":"u","price":10.0,"quantity":2}]
//! ```
//!
//! Decoding only checks the shape. Cart invariants (unique ids, quantity at
//! least 1) are checked by [`CartState::from_items`](crate::CartState::from_items).

use crate::error::{CoreError, CoreResult};
use crate::types::LineItem;

/// Encodes line items in cart order.
pub fn encode_items(items: &[LineItem]) -> CoreResult<String> {
    serde_json::to_string(items).map_err(|e| CoreError::Serialization(e.to_string()))
}

/// Decodes a stored payload into line items, keeping their order.
pub fn decode_items(payload: &str) -> CoreResult<Vec<LineItem>> {
    serde_json::from_str(payload).map_err(|e| CoreError::Deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_keeps_order() {
        let payload = r#"[
            {"id":"b","title":"B","imageUrl":"ub","price":2.5,"quantity":1},
            {"id":"a","title":"A","imageUrl":"ua","price":10,"quantity":4}
        ]"#;

        let items = decode_items(payload).unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();

        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(items[1].quantity, 4);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        for payload in ["", "null", "{}", "[{\"id\":1}]", "not json", "[{\"id\":\"a\",\"title\":\"T\",\"imageUrl\":\"u\",\"price\":1,\"quantity\":-1}]"] {
            let err = decode_items(payload).unwrap_err();
            assert!(
                matches!(err, CoreError::Deserialization(_)),
                "payload {payload:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_encode_empty() {
        assert_eq!(encode_items(&[]).unwrap(), "[]");
    }
}
