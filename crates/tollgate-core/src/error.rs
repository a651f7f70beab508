// SPDX-License-Identifier: BUSL-1.1
//! # Workflow Error Taxonomy
//!
//! The single error vocabulary for the payment-gated workflow. Expected
//! rejections (policy block, payment mismatch) are typed variants, not
//! panics; each variant knows whether retrying the same `action_id` can
//! succeed. The orchestrator and HTTP layer both dispatch on this taxonomy.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the payment-gated action workflow.
#[derive(Error, Debug, Clone)]
pub enum WorkflowError {
    /// Caller error: malformed or incomplete action payload. Not retryable.
    #[error("invalid action payload: {0}")]
    InvalidActionPayload(String),

    /// The policy gate returned BLOCK. Terminal for this `action_id`; a new
    /// id must be used to retry with different parameters.
    #[error("blocked by policy rule {rule:?} (trace {trace_id})")]
    PolicyBlocked {
        /// The matched rule identifier, when one applied.
        rule: Option<String>,
        /// Audit correlation id for the blocking evaluation.
        trace_id: Uuid,
    },

    /// The rule evaluator was unreachable. The gate fails closed; the
    /// condition is transient and retryable.
    #[error("policy gate unavailable: {0}")]
    PolicyGateUnavailable(String),

    /// Submitted payment does not match the outstanding descriptor.
    #[error("payment amount mismatch: expected {expected}, got {got}")]
    AmountMismatch {
        /// Amount demanded by the descriptor.
        expected: String,
        /// Amount carried by the submitted payload.
        got: String,
    },

    /// The payment payload replays an already-consumed proof.
    #[error("duplicate payment: proof already consumed for this action")]
    DuplicatePayment,

    /// The external payment rail rejected or failed the settlement.
    /// Retryable unless the rail marked the failure permanent.
    #[error("payment rail error: {message}")]
    PaymentRailError {
        /// The rail's message, verbatim.
        message: String,
        /// True when the rail marked the failure permanent.
        permanent: bool,
    },

    /// A bounded operation (gate, verify, finalize) timed out. Transient up
    /// to the configured attempt bound, then the action fails.
    #[error("timeout during {operation}")]
    Timeout {
        /// The operation that exceeded its deadline.
        operation: String,
    },

    /// The final side effect failed after payment was taken. The most
    /// sensitive failure: surfaced distinctly and flagged for manual
    /// reconciliation.
    #[error("downstream settlement failed after payment: {0}")]
    DownstreamSettlement(String),

    /// The operation is not valid in the action's current state.
    #[error("action {action_id} is in state {state}, cannot {operation}")]
    InvalidState {
        /// The action concerned.
        action_id: String,
        /// Its current lifecycle state.
        state: String,
        /// The operation that was attempted.
        operation: String,
    },

    /// No record exists for the given `action_id`.
    #[error("action not found: {0}")]
    NotFound(String),

    /// Unexpected internal condition (storage, serialization). Classified
    /// transient by the orchestrator.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    /// Whether retrying the same `action_id` can succeed without changing
    /// the request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::PolicyGateUnavailable(_) | Self::Timeout { .. } | Self::Internal(_) => true,
            Self::PaymentRailError { permanent, .. } => !permanent,
            Self::InvalidActionPayload(_)
            | Self::PolicyBlocked { .. }
            | Self::AmountMismatch { .. }
            | Self::DuplicatePayment
            | Self::DownstreamSettlement(_)
            | Self::InvalidState { .. }
            | Self::NotFound(_) => false,
        }
    }

    /// Machine-readable error code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidActionPayload(_) => "INVALID_ACTION_PAYLOAD",
            Self::PolicyBlocked { .. } => "POLICY_BLOCKED",
            Self::PolicyGateUnavailable(_) => "POLICY_GATE_UNAVAILABLE",
            Self::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            Self::DuplicatePayment => "DUPLICATE_PAYMENT",
            Self::PaymentRailError { .. } => "PAYMENT_RAIL_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::DownstreamSettlement(_) => "DOWNSTREAM_SETTLEMENT",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
