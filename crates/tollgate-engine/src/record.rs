// SPDX-License-Identifier: BUSL-1.1
//! # Per-Action Records
//!
//! One record per `action_id` — the only shared mutable state in the
//! workflow. All mutation flows through [`ActionRecord::transition`]; the
//! policy gate and payment verifier never write fields directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tollgate_core::{ActionId, ActionRequest, ActionType, WorkflowError};
use tollgate_payment::{PaymentDescriptor, PaymentProof};
use tollgate_policy::PolicyDecision;

use crate::state::{validate_transition, ActionState};

/// How the payment requirement was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// The action type does not require payment.
    NotRequired,
    /// A payment proof was verified.
    Paid,
    /// An administrator bypassed payment. Always audited, never silent.
    SkippedAdmin,
}

/// Persisted state for one action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_id: ActionId,
    pub action_type: ActionType,
    /// The original request payload; immutable for the record's lifetime.
    pub request: ActionRequest,
    pub state: ActionState,
    /// Most recent (authoritative) policy decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_decision: Option<PolicyDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_descriptor: Option<PaymentDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_proof: Option<PaymentProof>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    /// Result payload produced by finalization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Human-readable reason, set when `state == Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Set when the side effect failed (or is in doubt) after payment was
    /// taken; such records need manual reconciliation.
    #[serde(default)]
    pub needs_reconciliation: bool,
    /// Timeouts observed so far across bounded operations.
    #[serde(default)]
    pub timeout_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActionRecord {
    /// Create a fresh record in [`ActionState::Initiated`].
    pub fn new(action_id: ActionId, action_type: ActionType, request: ActionRequest) -> Self {
        let now = Utc::now();
        Self {
            action_id,
            action_type,
            request,
            state: ActionState::Initiated,
            policy_decision: None,
            payment_descriptor: None,
            payment_proof: None,
            payment_status: None,
            result: None,
            failure_reason: None,
            needs_reconciliation: false,
            timeout_attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance to `next`, validating against the transition table.
    pub fn transition(&mut self, next: ActionState) -> Result<(), WorkflowError> {
        validate_transition(&self.action_id, self.state, next)?;
        tracing::debug!(
            action_id = %self.action_id,
            from = %self.state,
            to = %next,
            "action state transition"
        );
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Move to `Failed` with a reason. Rejected from terminal states.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), WorkflowError> {
        self.transition(ActionState::Failed)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    /// Whether the record is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// True when `requires_review` was set by the policy decision.
    pub fn requires_review(&self) -> bool {
        self.policy_decision
            .as_ref()
            .is_some_and(|d| d.requires_review)
    }
}
