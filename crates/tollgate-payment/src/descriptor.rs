// SPDX-License-Identifier: BUSL-1.1
//! Payment wire types: descriptor, payload, proof.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use tollgate_core::{ActionId, ActionParty, MoneyAmount};

/// A request for payment tied to exactly one action.
///
/// Minted by the issuer the first time an action reaches the
/// awaiting-payment state; returned verbatim on every re-request while the
/// payment is outstanding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentDescriptor {
    /// The action this payment settles.
    pub action_id: ActionId,
    /// Amount demanded.
    pub amount: MoneyAmount,
    /// Who pays.
    pub payer: ActionParty,
    /// Who receives.
    pub receiver: ActionParty,
    /// External payment-rail endpoint that settles the payment off-path.
    pub facilitator_url: String,
    pub issued_at: DateTime<Utc>,
}

/// The raw payment submission from the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentPayload {
    /// Must reference the action being paid for.
    pub action_id: ActionId,
    /// Amount the client claims to have settled.
    pub amount: MoneyAmount,
    /// Opaque rail-specific instrument (e.g. signed transfer instructions).
    pub instrument: serde_json::Value,
}

impl PaymentPayload {
    /// SHA-256 hex digest of the serialized payload.
    ///
    /// Used for replay detection: an identical resubmission produces the
    /// same digest and is rejected once a proof has been consumed.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.action_id.as_str().as_bytes());
        hasher.update(self.amount.currency.as_bytes());
        hasher.update(self.amount.value.as_bytes());
        hasher.update(self.instrument.to_string().as_bytes());
        hex_encode(&hasher.finalize())
    }
}

/// Evidence that payment was made.
///
/// Once accepted, the action transitions irrevocably toward completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentProof {
    /// Opaque settlement identifier from the rail.
    pub transaction_hash: String,
    /// Digest of the payload that produced this proof.
    pub payload_digest: String,
    pub verified_at: DateTime<Utc>,
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: &str, nonce: u64) -> PaymentPayload {
        PaymentPayload {
            action_id: ActionId::new("a-1").unwrap(),
            amount: MoneyAmount::new("USD", value),
            instrument: json!({ "transfer": "signed-blob", "nonce": nonce }),
        }
    }

    #[test]
    fn digest_is_stable_for_identical_payloads() {
        assert_eq!(payload("50.00", 1).digest(), payload("50.00", 1).digest());
    }

    #[test]
    fn digest_differs_for_different_instruments() {
        assert_ne!(payload("50.00", 1).digest(), payload("50.00", 2).digest());
    }

    #[test]
    fn digest_differs_for_different_amounts() {
        assert_ne!(payload("50.00", 1).digest(), payload("40.00", 1).digest());
    }

    #[test]
    fn digest_is_hex_sha256() {
        let d = payload("50.00", 1).digest();
        assert_eq!(d.len(), 64);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn descriptor_serde_roundtrip() {
        let d = PaymentDescriptor {
            action_id: ActionId::new("a-1").unwrap(),
            amount: MoneyAmount::new("USD", "50.00"),
            payer: ActionParty::new("payer-1"),
            receiver: ActionParty::new("receiver-1"),
            facilitator_url: "https://facilitator.example/v1".to_string(),
            issued_at: Utc::now(),
        };
        let json = serde_json::to_string(&d).expect("serialize");
        let back: PaymentDescriptor = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, d);
    }
}
