// SPDX-License-Identifier: BUSL-1.1
//! # Payment Verifier
//!
//! Validates a submitted payment payload against the outstanding descriptor
//! for its action, rejects replays of already-consumed proofs, and asks the
//! payment rail to settle. Produces a [`PaymentProof`] on success.
//!
//! A payload digest enters the consumed set only after the rail reports
//! success, so a rejected or failed submission can be corrected and
//! resubmitted without tripping replay detection.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashSet;

use tollgate_core::{ActionId, WorkflowError};

use crate::descriptor::{PaymentPayload, PaymentProof};
use crate::issuer::DescriptorIssuer;
use crate::rail::PaymentRail;

/// Verifies payment payloads and mints proofs.
pub struct PaymentVerifier {
    issuer: Arc<DescriptorIssuer>,
    rail: Arc<dyn PaymentRail>,
    consumed: DashSet<String>,
}

impl std::fmt::Debug for PaymentVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentVerifier")
            .field("consumed", &self.consumed.len())
            .finish_non_exhaustive()
    }
}

impl PaymentVerifier {
    /// Create a verifier over the shared issuer and rail.
    pub fn new(issuer: Arc<DescriptorIssuer>, rail: Arc<dyn PaymentRail>) -> Self {
        Self {
            issuer,
            rail,
            consumed: DashSet::new(),
        }
    }

    /// Verify `payload` for `action_id`.
    ///
    /// Checks, in order: an outstanding descriptor exists; the payload
    /// references the same action; amount and currency match the descriptor
    /// (`AmountMismatch`); the payload is not a replay (`DuplicatePayment`);
    /// the rail settles (`PaymentRailError` otherwise).
    pub async fn verify(
        &self,
        action_id: &ActionId,
        payload: &PaymentPayload,
    ) -> Result<PaymentProof, WorkflowError> {
        let descriptor = self
            .issuer
            .outstanding(action_id)
            .ok_or_else(|| WorkflowError::NotFound(format!(
                "no outstanding payment descriptor for action {action_id}"
            )))?;

        if payload.action_id != *action_id {
            return Err(WorkflowError::InvalidActionPayload(format!(
                "payment payload references action {}, expected {action_id}",
                payload.action_id
            )));
        }

        if !payload.amount.matches(&descriptor.amount) {
            return Err(WorkflowError::AmountMismatch {
                expected: descriptor.amount.to_string(),
                got: payload.amount.to_string(),
            });
        }

        let digest = payload.digest();
        if self.consumed.contains(&digest) {
            return Err(WorkflowError::DuplicatePayment);
        }

        let receipt = self
            .rail
            .settle(&descriptor, payload)
            .await
            .map_err(|e| {
                tracing::warn!(
                    action_id = %action_id,
                    rail = self.rail.rail_name(),
                    permanent = e.permanent,
                    "payment rail settlement failed: {e}"
                );
                WorkflowError::from(e)
            })?;

        // Point of consumption: the proof exists from here on.
        self.consumed.insert(digest.clone());
        self.issuer.settle(action_id);

        tracing::info!(
            action_id = %action_id,
            transaction_hash = %receipt.transaction_hash,
            "payment verified"
        );
        Ok(PaymentProof {
            transaction_hash: receipt.transaction_hash,
            payload_digest: digest,
            verified_at: Utc::now(),
        })
    }

    /// Whether a payload digest has already produced a proof.
    pub fn is_consumed(&self, digest: &str) -> bool {
        self.consumed.contains(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rail::{MockOutcome, MockPaymentRail};
    use serde_json::json;
    use tollgate_core::{ActionParty, MoneyAmount};

    fn setup(rail: MockPaymentRail) -> (Arc<DescriptorIssuer>, PaymentVerifier, ActionId) {
        let issuer = Arc::new(DescriptorIssuer::new("https://facilitator.example/v1"));
        let action_id = ActionId::new("a-1").unwrap();
        issuer.issue(
            &action_id,
            MoneyAmount::new("USD", "50.00"),
            ActionParty::new("payer-1"),
            ActionParty::new("receiver-1"),
        );
        let verifier = PaymentVerifier::new(issuer.clone(), Arc::new(rail));
        (issuer, verifier, action_id)
    }

    fn payload(value: &str) -> PaymentPayload {
        PaymentPayload {
            action_id: ActionId::new("a-1").unwrap(),
            amount: MoneyAmount::new("USD", value),
            instrument: json!({ "transfer": "signed-blob" }),
        }
    }

    #[tokio::test]
    async fn matching_payload_yields_proof() {
        let (_issuer, verifier, action_id) = setup(MockPaymentRail::new());
        let proof = verifier.verify(&action_id, &payload("50.00")).await.expect("verify");
        assert!(proof.transaction_hash.starts_with("0x"));
        assert!(verifier.is_consumed(&proof.payload_digest));
    }

    #[tokio::test]
    async fn equivalent_decimal_matches_descriptor() {
        let (_issuer, verifier, action_id) = setup(MockPaymentRail::new());
        // "50" and "50.00" are the same value.
        assert!(verifier.verify(&action_id, &payload("50")).await.is_ok());
    }

    #[tokio::test]
    async fn amount_mismatch_is_rejected() {
        let (_issuer, verifier, action_id) = setup(MockPaymentRail::new());
        let err = verifier.verify(&action_id, &payload("40.00")).await.unwrap_err();
        match err {
            WorkflowError::AmountMismatch { expected, got } => {
                assert_eq!(expected, "50.00 USD");
                assert_eq!(got, "40.00 USD");
            }
            other => panic!("expected AmountMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wrong_currency_is_amount_mismatch() {
        let (_issuer, verifier, action_id) = setup(MockPaymentRail::new());
        let mut p = payload("50.00");
        p.amount = MoneyAmount::new("EUR", "50.00");
        let err = verifier.verify(&action_id, &p).await.unwrap_err();
        assert!(matches!(err, WorkflowError::AmountMismatch { .. }));
    }

    #[tokio::test]
    async fn wrong_action_id_is_rejected() {
        let (_issuer, verifier, action_id) = setup(MockPaymentRail::new());
        let mut p = payload("50.00");
        p.action_id = ActionId::new("a-other").unwrap();
        let err = verifier.verify(&action_id, &p).await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidActionPayload(_)));
    }

    #[tokio::test]
    async fn replay_after_success_is_duplicate() {
        let (issuer, verifier, action_id) = setup(MockPaymentRail::new());
        verifier.verify(&action_id, &payload("50.00")).await.expect("first");

        // Re-issue so an outstanding descriptor exists again; the digest is
        // consumed regardless, so the replay must still be rejected.
        issuer.issue(
            &action_id,
            MoneyAmount::new("USD", "50.00"),
            ActionParty::new("payer-1"),
            ActionParty::new("receiver-1"),
        );
        let err = verifier.verify(&action_id, &payload("50.00")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicatePayment));
    }

    #[tokio::test]
    async fn rail_failure_does_not_consume_payload() {
        let (_issuer, verifier, action_id) = setup(MockPaymentRail::scripted(vec![
            MockOutcome::FailTransient("rail outage".into()),
        ]));

        let err = verifier.verify(&action_id, &payload("50.00")).await.unwrap_err();
        match &err {
            WorkflowError::PaymentRailError { permanent, .. } => assert!(!permanent),
            other => panic!("expected PaymentRailError, got {other:?}"),
        }
        assert!(err.is_retryable());

        // The same payload succeeds once the rail recovers.
        assert!(verifier.verify(&action_id, &payload("50.00")).await.is_ok());
    }

    #[tokio::test]
    async fn no_outstanding_descriptor_is_not_found() {
        let issuer = Arc::new(DescriptorIssuer::new("https://facilitator.example/v1"));
        let verifier = PaymentVerifier::new(issuer, Arc::new(MockPaymentRail::new()));
        let action_id = ActionId::new("a-1").unwrap();
        let err = verifier.verify(&action_id, &payload("50.00")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }
}
