// SPDX-License-Identifier: BUSL-1.1
//! Policy decision types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The action may proceed.
    Allow,
    /// The action must not proceed to payment or finalization.
    Block,
    /// The action proceeds but is marked for human review downstream.
    Flag,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Block => write!(f, "block"),
            Self::Flag => write!(f, "flag"),
        }
    }
}

/// Result of one policy evaluation.
///
/// Created once per action; never mutated. A re-evaluation for the same
/// action is a new object, and only the most recent is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// The verdict.
    pub decision: Decision,
    /// Identifier of the matched rule, when one applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_applied: Option<String>,
    /// Opaque audit correlation id, unique per evaluation call.
    pub trace_id: Uuid,
    /// True when a reviewer should look at this action. Set for FLAG;
    /// carried downstream without blocking progress.
    pub requires_review: bool,
}

impl PolicyDecision {
    /// An ALLOW decision with a fresh trace id.
    pub fn allow() -> Self {
        Self {
            decision: Decision::Allow,
            rule_applied: None,
            trace_id: Uuid::new_v4(),
            requires_review: false,
        }
    }

    /// A BLOCK decision attributed to `rule`.
    pub fn block(rule: impl Into<String>) -> Self {
        Self {
            decision: Decision::Block,
            rule_applied: Some(rule.into()),
            trace_id: Uuid::new_v4(),
            requires_review: false,
        }
    }

    /// A FLAG decision attributed to `rule`.
    pub fn flag(rule: impl Into<String>) -> Self {
        Self {
            decision: Decision::Flag,
            rule_applied: Some(rule.into()),
            trace_id: Uuid::new_v4(),
            requires_review: true,
        }
    }

    /// True when the action may progress (ALLOW or FLAG).
    pub fn permits_progress(&self) -> bool {
        self.decision != Decision::Block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_permits_progress() {
        assert!(PolicyDecision::allow().permits_progress());
    }

    #[test]
    fn flag_permits_progress_and_requires_review() {
        let d = PolicyDecision::flag("large-amount");
        assert!(d.permits_progress());
        assert!(d.requires_review);
        assert_eq!(d.rule_applied.as_deref(), Some("large-amount"));
    }

    #[test]
    fn block_does_not_permit_progress() {
        assert!(!PolicyDecision::block("amount-cap").permits_progress());
    }

    #[test]
    fn trace_ids_are_unique_per_evaluation() {
        assert_ne!(PolicyDecision::allow().trace_id, PolicyDecision::allow().trace_id);
    }

    #[test]
    fn decision_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Decision::Block).unwrap(), "\"block\"");
    }
}
