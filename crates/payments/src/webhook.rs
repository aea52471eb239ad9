//! Gateway webhook payloads.

use common::ChargeId;
use serde_json::Value;

use crate::error::{PaymentError, Result};

/// The fields of a charge webhook this system acts on.
///
/// Expected shape is `{ "data": { "id": "...", "status": "...", ... } }`;
/// everything else in the payload is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub charge_id: ChargeId,
    /// Raw gateway status, not yet validated.
    pub status: String,
}

impl WebhookEvent {
    /// Extracts the charge id and status. `data` is checked first, then
    /// `status`, then `id`.
    pub fn parse(payload: &Value) -> Result<Self> {
        let data = payload
            .get("data")
            .and_then(Value::as_object)
            .ok_or_else(|| PaymentError::InvalidWebhook("missing data".to_string()))?;

        let status = data
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| PaymentError::InvalidWebhook("missing status".to_string()))?;

        let charge_id = data
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PaymentError::InvalidWebhook("missing charge id".to_string()))?;

        Ok(Self {
            charge_id: ChargeId::new(charge_id),
            status: status.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invalid_reason(payload: Value) -> String {
        match WebhookEvent::parse(&payload) {
            Err(PaymentError::InvalidWebhook(reason)) => reason,
            other => panic!("expected InvalidWebhook, got {other:?}"),
        }
    }

    #[test]
    fn parses_id_and_status_ignoring_extra_fields() {
        let event = WebhookEvent::parse(&json!({
            "key": "charge.complete",
            "data": { "id": "chrg_1", "status": "successful", "amount": 10000 }
        }))
        .unwrap();

        assert_eq!(event.charge_id, ChargeId::new("chrg_1"));
        assert_eq!(event.status, "successful");
    }

    #[test]
    fn missing_or_non_object_data() {
        assert_eq!(invalid_reason(json!({})), "missing data");
        assert_eq!(invalid_reason(json!({ "data": "chrg_1" })), "missing data");
        assert_eq!(invalid_reason(json!([1, 2])), "missing data");
    }

    #[test]
    fn status_is_checked_before_id() {
        assert_eq!(invalid_reason(json!({ "data": {} })), "missing status");
        assert_eq!(
            invalid_reason(json!({ "data": { "id": "chrg_1", "status": 3 } })),
            "missing status"
        );
    }

    #[test]
    fn missing_or_empty_charge_id() {
        assert_eq!(
            invalid_reason(json!({ "data": { "status": "successful" } })),
            "missing charge id"
        );
        assert_eq!(
            invalid_reason(json!({ "data": { "id": "", "status": "successful" } })),
            "missing charge id"
        );
    }
}
