// SPDX-License-Identifier: BUSL-1.1
//! # Action Lifecycle States
//!
//! A single tagged state value per action replaces the flat sets of
//! status booleans the workflow's call sites otherwise accumulate.
//! Transition validity is enforced by a match table; invalid combinations
//! are unrepresentable.

use serde::{Deserialize, Serialize};

use tollgate_core::{ActionId, WorkflowError};

/// Lifecycle state of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    /// Received, not yet evaluated.
    Initiated,
    /// Policy evaluation in flight (or pending retry after a transient
    /// gate failure).
    PolicyEvaluating,
    /// Terminal: the policy gate returned BLOCK.
    Blocked,
    /// Policy passed (ALLOW, or FLAG with `requires_review`).
    PolicyPassed,
    /// A payment descriptor is outstanding.
    AwaitingPayment,
    /// Payment verified; finalization pending.
    Paid,
    /// Payment bypassed (admin) or not required; finalization pending.
    SkippedPayment,
    /// Terminal: the side effect executed exactly once.
    Completed,
    /// Terminal: unrecoverable error.
    Failed,
}

impl ActionState {
    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Blocked | Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ActionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initiated => "initiated",
            Self::PolicyEvaluating => "policy_evaluating",
            Self::Blocked => "blocked",
            Self::PolicyPassed => "policy_passed",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Paid => "paid",
            Self::SkippedPayment => "skipped_payment",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Validate a transition, or error if the pair is not in the table.
///
/// `Failed` is reachable from any non-terminal state; terminal states have
/// no outgoing edges.
pub fn validate_transition(
    action_id: &ActionId,
    from: ActionState,
    to: ActionState,
) -> Result<(), WorkflowError> {
    use ActionState::*;
    let valid = matches!(
        (from, to),
        (Initiated, PolicyEvaluating)
            | (PolicyEvaluating, Blocked)
            | (PolicyEvaluating, PolicyPassed)
            | (PolicyPassed, AwaitingPayment)
            | (PolicyPassed, SkippedPayment)
            | (AwaitingPayment, Paid)
            | (Paid, Completed)
            | (SkippedPayment, Completed)
    ) || (to == Failed && !from.is_terminal());

    if valid {
        Ok(())
    } else {
        Err(WorkflowError::InvalidState {
            action_id: action_id.to_string(),
            state: from.to_string(),
            operation: format!("transition to {to}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ActionId {
        ActionId::new("a-1").unwrap()
    }

    #[test]
    fn happy_path_transitions_are_valid() {
        use ActionState::*;
        for (from, to) in [
            (Initiated, PolicyEvaluating),
            (PolicyEvaluating, PolicyPassed),
            (PolicyPassed, AwaitingPayment),
            (AwaitingPayment, Paid),
            (Paid, Completed),
        ] {
            validate_transition(&id(), from, to).expect("valid transition");
        }
    }

    #[test]
    fn skip_path_transitions_are_valid() {
        use ActionState::*;
        validate_transition(&id(), PolicyPassed, SkippedPayment).unwrap();
        validate_transition(&id(), SkippedPayment, Completed).unwrap();
    }

    #[test]
    fn block_is_only_reachable_from_evaluating() {
        use ActionState::*;
        validate_transition(&id(), PolicyEvaluating, Blocked).unwrap();
        assert!(validate_transition(&id(), PolicyPassed, Blocked).is_err());
        assert!(validate_transition(&id(), AwaitingPayment, Blocked).is_err());
    }

    #[test]
    fn any_non_terminal_state_can_fail() {
        use ActionState::*;
        for from in [
            Initiated,
            PolicyEvaluating,
            PolicyPassed,
            AwaitingPayment,
            Paid,
            SkippedPayment,
        ] {
            validate_transition(&id(), from, Failed).expect("can fail");
        }
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        use ActionState::*;
        for from in [Blocked, Completed, Failed] {
            for to in [
                Initiated,
                PolicyEvaluating,
                Blocked,
                PolicyPassed,
                AwaitingPayment,
                Paid,
                SkippedPayment,
                Completed,
                Failed,
            ] {
                assert!(
                    validate_transition(&id(), from, to).is_err(),
                    "{from} -> {to} must be rejected"
                );
            }
        }
    }

    #[test]
    fn cannot_skip_policy_evaluation() {
        use ActionState::*;
        assert!(validate_transition(&id(), Initiated, PolicyPassed).is_err());
        assert!(validate_transition(&id(), Initiated, AwaitingPayment).is_err());
        assert!(validate_transition(&id(), PolicyEvaluating, AwaitingPayment).is_err());
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&ActionState::AwaitingPayment).unwrap();
        assert_eq!(json, "\"awaiting_payment\"");
    }
}
