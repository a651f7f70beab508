// SPDX-License-Identifier: BUSL-1.1
//! # PolicyGate Capability Trait
//!
//! The seam between the workflow engine and whatever evaluates compliance
//! rules. Object-safe so the engine can hold `Arc<dyn PolicyGate>`; async
//! because production gates call out over the network.

use async_trait::async_trait;
use tollgate_core::{ActionId, ActionRequest, ActionType, WorkflowError};

use crate::decision::PolicyDecision;

/// Evaluates a proposed action against compliance rules.
///
/// ## Contract
///
/// - The input payload must carry a positive amount and a party identifier;
///   otherwise the gate fails with [`WorkflowError::InvalidActionPayload`].
/// - A returned decision always carries a fresh, unique `trace_id`.
/// - A BLOCK decision means the caller must not proceed to payment or
///   finalization under any circumstance.
/// - An audit record is emitted for every evaluation, including error paths.
/// - If the underlying evaluator is unavailable the gate fails closed with
///   [`WorkflowError::PolicyGateUnavailable`] — never a default ALLOW.
#[async_trait]
pub trait PolicyGate: Send + Sync {
    /// Evaluate `request` for the given action.
    async fn evaluate(
        &self,
        action_id: &ActionId,
        action_type: ActionType,
        request: &ActionRequest,
    ) -> Result<PolicyDecision, WorkflowError>;
}
