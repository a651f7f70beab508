// SPDX-License-Identifier: BUSL-1.1
//! # Action Primitives
//!
//! The action is the unit of work routed through the payment-gated workflow:
//! a sensitive operation (trade settlement, document notarization) identified
//! by a stable idempotency key. This module defines the identifier newtype,
//! the action taxonomy, the request payload, and the caller identity that
//! authorizes privileged paths.

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::money::MoneyAmount;

/// Maximum accepted length of an action id.
pub const MAX_ACTION_ID_LEN: usize = 128;

/// Stable idempotency key for one logical action.
///
/// Client- or server-generated; unique per logical request. Retries of the
/// same logical action MUST reuse the same id — the engine deduplicates and
/// serializes on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    /// Construct a validated action id: non-empty, at most
    /// [`MAX_ACTION_ID_LEN`] bytes, no whitespace or control characters.
    pub fn new(raw: impl Into<String>) -> Result<Self, WorkflowError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(WorkflowError::InvalidActionPayload(
                "action_id must be non-empty".to_string(),
            ));
        }
        if raw.len() > MAX_ACTION_ID_LEN {
            return Err(WorkflowError::InvalidActionPayload(format!(
                "action_id exceeds {MAX_ACTION_ID_LEN} bytes"
            )));
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(WorkflowError::InvalidActionPayload(
                "action_id must not contain whitespace or control characters".to_string(),
            ));
        }
        Ok(Self(raw))
    }

    /// The raw key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The kind of sensitive operation being gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Settle a trade between two parties.
    Settlement,
    /// Write a notarization record for a document.
    Notarization,
}

impl ActionType {
    /// Whether this action type requires the payment handshake before
    /// finalization. Both current types are paid operations; a future
    /// unpaid type routes straight to `SkippedPayment` semantics with
    /// `payment_status = not_required`.
    pub fn requires_payment(&self) -> bool {
        match self {
            Self::Settlement => true,
            Self::Notarization => true,
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Settlement => write!(f, "settlement"),
            Self::Notarization => write!(f, "notarization"),
        }
    }
}

/// A party to the action (borrower, counterparty, document owner).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionParty {
    /// Stable identifier (registry number, account id, internal id).
    pub party_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional external identifier (e.g. an on-chain address).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
}

impl ActionParty {
    /// Construct a party from its stable identifier.
    pub fn new(party_id: impl Into<String>) -> Self {
        Self {
            party_id: party_id.into(),
            name: None,
            external_ref: None,
        }
    }
}

/// Action-specific request payload.
///
/// Every action carries at minimum a monetary amount and the primary party
/// it concerns; the remaining fields qualify the underlying entity being
/// acted on. The payload is immutable for the lifetime of its `action_id` —
/// resubmitting a changed payload under the same id is rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionRequest {
    /// The monetary amount the action concerns.
    pub amount: MoneyAmount,
    /// Primary party (borrower, payer, document owner).
    pub party: ActionParty,
    /// Counterparty, where the action has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<ActionParty>,
    /// Reference to the entity being acted on (trade id, document id).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Action-specific extras (required signers, terms).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ActionRequest {
    /// Validate the request payload.
    ///
    /// Fails with [`WorkflowError::InvalidActionPayload`] when the amount is
    /// not strictly positive or the required party is absent.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        self.amount
            .validate()
            .map_err(|e| WorkflowError::InvalidActionPayload(e.to_string()))?;
        if !self.amount.is_positive() {
            return Err(WorkflowError::InvalidActionPayload(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        if self.party.party_id.trim().is_empty() {
            return Err(WorkflowError::InvalidActionPayload(
                "party.party_id must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Authorization role of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular caller; may execute and pay.
    Operator,
    /// Privileged caller; may additionally bypass payment.
    Admin,
}

/// Identity and intent of the caller driving an action.
///
/// Supplied by the authentication layer, passed into the engine explicitly —
/// the workflow never reads ambient auth state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerContext {
    /// Stable actor identifier for the audit trail.
    pub actor_id: String,
    /// Authorization role.
    pub role: Role,
    /// Request to bypass the payment handshake. Honored only for
    /// [`Role::Admin`]; always recorded in the audit trail.
    #[serde(default)]
    pub skip_payment: bool,
}

impl CallerContext {
    /// An unprivileged caller.
    pub fn operator(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            role: Role::Operator,
            skip_payment: false,
        }
    }

    /// An administrator requesting a payment bypass.
    pub fn admin_skip(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            role: Role::Admin,
            skip_payment: true,
        }
    }

    /// Whether this caller is authorized to bypass payment.
    pub fn can_skip_payment(&self) -> bool {
        self.skip_payment && self.role == Role::Admin
    }
}
