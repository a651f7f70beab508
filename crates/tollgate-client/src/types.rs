// SPDX-License-Identifier: BUSL-1.1
//! Wire types for the workflow API.
//!
//! Mirrors the server's request and response bodies. Amounts and parties
//! reuse the core types so the JSON shapes cannot drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use tollgate_core::{ActionParty, ActionType, MoneyAmount};

/// Body of `POST /v1/actions/:action_id/execute`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteRequest {
    pub action_type: ActionType,
    pub amount: MoneyAmount,
    pub party: ActionParty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<ActionParty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Request the admin payment bypass. Honored only for admin tokens.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip_payment: bool,
}

impl ExecuteRequest {
    /// A minimal request: amount and primary party.
    pub fn new(action_type: ActionType, amount: MoneyAmount, party: ActionParty) -> Self {
        Self {
            action_type,
            amount,
            party,
            counterparty: None,
            reference: None,
            metadata: None,
            skip_payment: false,
        }
    }
}

/// Body of `POST /v1/actions/:action_id/pay`.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRequest {
    pub amount: MoneyAmount,
    /// Opaque rail-specific payment instrument.
    pub instrument: Value,
}

/// The payment descriptor carried by a 402 response.
#[derive(Debug, Clone, Deserialize)]
pub struct Descriptor {
    pub action_id: String,
    pub amount: MoneyAmount,
    pub payer_id: String,
    pub receiver_id: String,
    pub facilitator_url: String,
    pub issued_at: DateTime<Utc>,
}

/// Body of a 402 Payment Required response.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequired {
    pub action_id: String,
    pub state: String,
    pub requires_review: bool,
    pub payment: Descriptor,
}

/// An action record as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionView {
    pub action_id: String,
    pub action_type: String,
    pub state: String,
    #[serde(default)]
    pub payment_status: Option<String>,
    pub requires_review: bool,
    pub needs_reconciliation: bool,
    #[serde(default)]
    pub rule_applied: Option<String>,
    #[serde(default)]
    pub trace_id: Option<Uuid>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Structured error response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<Value>,
    #[serde(default)]
    pub retryable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn execute_request_serializes_expected_shape() {
        let req = ExecuteRequest::new(
            ActionType::Settlement,
            MoneyAmount::new("USD", "50000"),
            ActionParty::new("party-1"),
        );
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["action_type"], "settlement");
        assert_eq!(value["amount"]["currency"], "USD");
        assert_eq!(value["party"]["party_id"], "party-1");
        // Unset options and the default skip flag stay off the wire.
        assert!(value.get("counterparty").is_none());
        assert!(value.get("skip_payment").is_none());
    }

    #[test]
    fn payment_required_parses_server_body() {
        let body = json!({
            "action_id": "settle-1",
            "state": "awaiting_payment",
            "requires_review": false,
            "payment": {
                "action_id": "settle-1",
                "amount": { "currency": "USD", "value": "50000" },
                "payer_id": "party-1",
                "receiver_id": "tollgate-operator",
                "facilitator_url": "https://facilitator.example/v1",
                "issued_at": "2026-08-26T12:00:00Z"
            }
        });
        let parsed: PaymentRequired = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.payment.amount.value, "50000");
        assert_eq!(parsed.payment.receiver_id, "tollgate-operator");
    }

    #[test]
    fn action_view_tolerates_missing_optionals() {
        let body = json!({
            "action_id": "settle-1",
            "action_type": "settlement",
            "state": "completed",
            "payment_status": "paid",
            "requires_review": false,
            "needs_reconciliation": false,
            "created_at": "2026-08-26T12:00:00Z",
            "updated_at": "2026-08-26T12:00:05Z"
        });
        let parsed: ActionView = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.state, "completed");
        assert!(parsed.transaction_hash.is_none());
    }
}
