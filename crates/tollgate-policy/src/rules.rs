// SPDX-License-Identifier: BUSL-1.1
//! # In-Memory Reference Rule Evaluator
//!
//! A first-match rule engine implementing [`PolicyGate`]. Rules are ordered;
//! the first matching rule decides (BLOCK or FLAG), and an action matching
//! no rule is ALLOWED. This is the reference evaluator for deployments that
//! do not plug in an external compliance service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use tollgate_core::{ActionId, ActionRequest, ActionType, MoneyAmount, WorkflowError};

use crate::audit::AuditLog;
use crate::decision::PolicyDecision;
use crate::gate::PolicyGate;

/// Condition under which a rule applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCondition {
    /// Matches when the request amount exceeds `threshold` in the same
    /// currency. Requests in other currencies do not match.
    AmountAbove { threshold: MoneyAmount },
    /// Matches when the primary party or the counterparty appears in
    /// `party_ids`.
    PartyDenied { party_ids: Vec<String> },
    /// Matches actions of the given type.
    ActionTypeIs { action_type: ActionType },
}

impl RuleCondition {
    /// Whether this condition matches the request.
    fn matches(&self, action_type: ActionType, request: &ActionRequest) -> bool {
        match self {
            Self::AmountAbove { threshold } => {
                if request.amount.currency != threshold.currency {
                    return false;
                }
                match (request.amount.scaled_units(), threshold.scaled_units()) {
                    (Ok(amount), Ok(limit)) => amount > limit,
                    _ => false,
                }
            }
            Self::PartyDenied { party_ids } => {
                party_ids.iter().any(|p| p == &request.party.party_id)
                    || request
                        .counterparty
                        .as_ref()
                        .is_some_and(|cp| party_ids.iter().any(|p| p == &cp.party_id))
            }
            Self::ActionTypeIs { action_type: t } => *t == action_type,
        }
    }
}

/// What a matching rule does to the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleEffect {
    /// Terminal refusal; the action never reaches payment.
    Block,
    /// Proceed, but mark `requires_review` for downstream visibility.
    Flag,
}

/// One compliance rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Stable rule identifier, surfaced verbatim to callers on BLOCK/FLAG.
    pub rule_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub condition: RuleCondition,
    pub effect: RuleEffect,
}

/// First-match rule evaluator backed by an ordered rule list.
///
/// Every evaluation appends an audit record — success, block, flag, and
/// invalid-payload paths alike.
pub struct RulePolicyGate {
    rules: Vec<PolicyRule>,
    audit: Arc<AuditLog>,
}

impl std::fmt::Debug for RulePolicyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RulePolicyGate")
            .field("rules", &self.rules.len())
            .finish_non_exhaustive()
    }
}

impl RulePolicyGate {
    /// Create a gate over an ordered rule list.
    pub fn new(rules: Vec<PolicyRule>, audit: Arc<AuditLog>) -> Self {
        Self { rules, audit }
    }

    /// A gate with no rules: everything is allowed (but still audited).
    pub fn allow_all(audit: Arc<AuditLog>) -> Self {
        Self::new(Vec::new(), audit)
    }
}

#[async_trait]
impl PolicyGate for RulePolicyGate {
    async fn evaluate(
        &self,
        action_id: &ActionId,
        action_type: ActionType,
        request: &ActionRequest,
    ) -> Result<PolicyDecision, WorkflowError> {
        // The audit trail must record the attempt even when the payload is
        // rejected before any rule runs.
        if let Err(e) = request.validate() {
            self.audit.append(
                action_id.as_str(),
                "policy.rejected_payload",
                json!({ "reason": e.to_string() }),
            );
            return Err(e);
        }

        let matched = self
            .rules
            .iter()
            .find(|rule| rule.condition.matches(action_type, request));

        let decision = match matched {
            Some(rule) => match rule.effect {
                RuleEffect::Block => PolicyDecision::block(rule.rule_id.clone()),
                RuleEffect::Flag => PolicyDecision::flag(rule.rule_id.clone()),
            },
            None => PolicyDecision::allow(),
        };

        tracing::info!(
            action_id = %action_id,
            %action_type,
            decision = %decision.decision,
            rule = decision.rule_applied.as_deref().unwrap_or("-"),
            trace_id = %decision.trace_id,
            "policy evaluated"
        );
        self.audit.append(
            action_id.as_str(),
            "policy.evaluated",
            json!({
                "decision": decision.decision,
                "rule_applied": decision.rule_applied,
                "trace_id": decision.trace_id,
                "requires_review": decision.requires_review,
            }),
        );

        Ok(decision)
    }
}
