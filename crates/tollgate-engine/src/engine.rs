// SPDX-License-Identifier: BUSL-1.1
//! # Action Engine
//!
//! Drives actions through policy evaluation, the payment handshake, and
//! finalization. One generic engine serves every action type; the
//! type-specific side effect is an injected [`ActionFinalizer`].
//!
//! ## Concurrency discipline
//!
//! Each `action_id` maps to an `Arc<tokio::Mutex<ActionRecord>>` pinned in a
//! `DashMap`. Every operation locks the per-key mutex for its whole drive,
//! giving single-writer-per-key: two concurrent executes for the same key
//! cannot both pass policy evaluation or both consume a descriptor. Distinct
//! keys proceed fully in parallel; there is no global lock.
//!
//! ## Point of no return
//!
//! Once a payment proof is accepted (or payment is skipped), finalization
//! runs on a detached task. A caller abandoning the request does not cancel
//! the side effect; a later poll or resubmit with the same `action_id`
//! observes the final state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::json;
use tokio::sync::Mutex;
use uuid::Uuid;

use tollgate_core::{ActionId, ActionParty, ActionRequest, ActionType, CallerContext, WorkflowError};
use tollgate_payment::{DescriptorIssuer, PaymentDescriptor, PaymentPayload, PaymentVerifier};
use tollgate_policy::{AuditLog, PolicyGate};

use crate::finalizer::ActionFinalizer;
use crate::record::{ActionRecord, PaymentStatus};
use crate::state::ActionState;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline for each bounded call (policy gate, payment verification,
    /// finalization). A timeout is transient until the attempt bound.
    pub operation_timeout: Duration,
    /// Timeouts tolerated per action before it fails with reason `Timeout`.
    pub max_timeout_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(10),
            max_timeout_attempts: 3,
        }
    }
}

/// Outcome of an `execute` or `pay` call that did not error.
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    /// The action reached `Completed`; the record carries the result and
    /// payment status.
    Completed { record: ActionRecord },
    /// Payment is outstanding — the "402" signal. Carries the descriptor
    /// (the same one on every re-request) and the review marker.
    PaymentRequired {
        descriptor: PaymentDescriptor,
        requires_review: bool,
    },
    /// The policy gate blocked the action. Terminal for this `action_id`.
    Blocked {
        rule: Option<String>,
        trace_id: Uuid,
    },
}

/// Where a drive stopped inside the state machine.
enum Boundary {
    Outcome(ActionOutcome),
    ReadyToFinalize,
}

/// The server-side action state machine.
pub struct ActionEngine {
    records: DashMap<ActionId, Arc<Mutex<ActionRecord>>>,
    gate: Arc<dyn PolicyGate>,
    issuer: Arc<DescriptorIssuer>,
    verifier: Arc<PaymentVerifier>,
    finalizers: HashMap<ActionType, Arc<dyn ActionFinalizer>>,
    audit: Arc<AuditLog>,
    /// Receiver stamped into every payment descriptor.
    receiver: ActionParty,
    config: EngineConfig,
}

impl std::fmt::Debug for ActionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionEngine")
            .field("records", &self.records.len())
            .field("finalizers", &self.finalizers.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ActionEngine {
    /// Create an engine with no registered finalizers.
    pub fn new(
        gate: Arc<dyn PolicyGate>,
        issuer: Arc<DescriptorIssuer>,
        verifier: Arc<PaymentVerifier>,
        audit: Arc<AuditLog>,
        receiver: ActionParty,
    ) -> Self {
        Self {
            records: DashMap::new(),
            gate,
            issuer,
            verifier,
            finalizers: HashMap::new(),
            audit,
            receiver,
            config: EngineConfig::default(),
        }
    }

    /// Override the default configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register the side-effect capability for an action type.
    pub fn register_finalizer(
        mut self,
        action_type: ActionType,
        finalizer: Arc<dyn ActionFinalizer>,
    ) -> Self {
        self.finalizers.insert(action_type, finalizer);
        self
    }

    /// The shared audit log.
    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// Snapshot of the record for `action_id`, if one exists.
    pub async fn get(&self, action_id: &ActionId) -> Option<ActionRecord> {
        let cell = self.records.get(action_id).map(|e| e.value().clone())?;
        let rec = cell.lock().await;
        Some(rec.clone())
    }

    /// Execute (or resume) the action identified by `action_id`.
    ///
    /// A request for an existing `action_id` attaches to that execution:
    /// it waits for the per-key lock and then observes the current state —
    /// no second policy evaluation, no second descriptor. A changed payload
    /// under the same id is rejected.
    pub async fn execute(
        &self,
        action_id: ActionId,
        action_type: ActionType,
        request: ActionRequest,
        caller: CallerContext,
    ) -> Result<ActionOutcome, WorkflowError> {
        request.validate()?;

        let cell = self
            .records
            .entry(action_id.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(ActionRecord::new(
                    action_id.clone(),
                    action_type,
                    request.clone(),
                )))
            })
            .clone();

        let mut rec = cell.lock().await;

        if rec.action_type != action_type || rec.request != request {
            return Err(WorkflowError::InvalidActionPayload(format!(
                "action {action_id} already exists with a different payload; \
                 use a new action_id to change parameters"
            )));
        }

        match self.advance(&mut rec, &caller).await? {
            Boundary::Outcome(outcome) => Ok(outcome),
            Boundary::ReadyToFinalize => {
                drop(rec);
                self.finalize_detached(cell).await
            }
        }
    }

    /// Submit a payment payload for an action awaiting payment.
    pub async fn pay(
        &self,
        action_id: ActionId,
        payload: PaymentPayload,
    ) -> Result<ActionOutcome, WorkflowError> {
        let cell = self
            .records
            .get(&action_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| WorkflowError::NotFound(action_id.to_string()))?;

        let mut rec = cell.lock().await;

        match rec.state {
            ActionState::AwaitingPayment => {}
            ActionState::Paid | ActionState::SkippedPayment | ActionState::Completed => {
                // Replaying the payload that produced the accepted proof is
                // a duplicate payment, not an invalid state.
                let replay = rec
                    .payment_proof
                    .as_ref()
                    .is_some_and(|p| p.payload_digest == payload.digest());
                return Err(if replay {
                    WorkflowError::DuplicatePayment
                } else {
                    WorkflowError::InvalidState {
                        action_id: action_id.to_string(),
                        state: rec.state.to_string(),
                        operation: "pay".to_string(),
                    }
                });
            }
            ActionState::Blocked => return Err(self.blocked_error(&rec)),
            _ => {
                return Err(WorkflowError::InvalidState {
                    action_id: action_id.to_string(),
                    state: rec.state.to_string(),
                    operation: "pay".to_string(),
                })
            }
        }

        let verified = tokio::time::timeout(
            self.config.operation_timeout,
            self.verifier.verify(&action_id, &payload),
        )
        .await;

        match verified {
            Err(_elapsed) => Err(self.note_timeout(&mut rec, "payment verification")),
            Ok(Err(e)) => {
                // The action stays in AwaitingPayment on every rejection,
                // including a permanent rail rejection: permanence binds the
                // submitted payload, not the action, so a corrected payload
                // (different instrument) may still settle against the same
                // descriptor. Each rejection is audited; the action only
                // fails through the timeout bound or an explicit terminal
                // transition.
                self.audit.append(
                    action_id.as_str(),
                    "payment.rejected",
                    json!({ "code": e.code(), "reason": e.to_string() }),
                );
                Err(e)
            }
            Ok(Ok(proof)) => {
                rec.payment_proof = Some(proof.clone());
                rec.payment_status = Some(PaymentStatus::Paid);
                rec.transition(ActionState::Paid)?;
                self.audit.append(
                    action_id.as_str(),
                    "payment.verified",
                    json!({ "transaction_hash": proof.transaction_hash }),
                );
                drop(rec);
                self.finalize_detached(cell).await
            }
        }
    }

    /// Drive the record forward until an outcome or the finalize boundary.
    async fn advance(
        &self,
        rec: &mut ActionRecord,
        caller: &CallerContext,
    ) -> Result<Boundary, WorkflowError> {
        loop {
            match rec.state {
                ActionState::Initiated => {
                    rec.transition(ActionState::PolicyEvaluating)?;
                }
                ActionState::PolicyEvaluating => {
                    self.evaluate_policy(rec).await?;
                }
                ActionState::PolicyPassed => {
                    return self.resolve_payment_requirement(rec, caller);
                }
                ActionState::AwaitingPayment => {
                    let descriptor = rec.payment_descriptor.clone().ok_or_else(|| {
                        WorkflowError::Internal(format!(
                            "action {} awaits payment without a descriptor",
                            rec.action_id
                        ))
                    })?;
                    return Ok(Boundary::Outcome(ActionOutcome::PaymentRequired {
                        descriptor,
                        requires_review: rec.requires_review(),
                    }));
                }
                ActionState::Paid | ActionState::SkippedPayment => {
                    return Ok(Boundary::ReadyToFinalize);
                }
                ActionState::Blocked => {
                    return Ok(Boundary::Outcome(match self.blocked_error(rec) {
                        WorkflowError::PolicyBlocked { rule, trace_id } => {
                            ActionOutcome::Blocked { rule, trace_id }
                        }
                        other => return Err(other),
                    }));
                }
                ActionState::Completed => {
                    return Ok(Boundary::Outcome(ActionOutcome::Completed {
                        record: rec.clone(),
                    }));
                }
                ActionState::Failed => {
                    return Err(WorkflowError::InvalidState {
                        action_id: rec.action_id.to_string(),
                        state: rec.state.to_string(),
                        operation: format!(
                            "execute (previously failed: {})",
                            rec.failure_reason.as_deref().unwrap_or("unknown")
                        ),
                    });
                }
            }
        }
    }

    /// Run the policy gate once and apply its decision.
    ///
    /// A stored decision is reused on later drives — the state has already
    /// moved past `PolicyEvaluating`, so this only runs while no
    /// authoritative decision exists.
    async fn evaluate_policy(&self, rec: &mut ActionRecord) -> Result<(), WorkflowError> {
        let evaluated = tokio::time::timeout(
            self.config.operation_timeout,
            self.gate.evaluate(&rec.action_id, rec.action_type, &rec.request),
        )
        .await;

        let decision = match evaluated {
            Err(_elapsed) => return Err(self.note_timeout(rec, "policy evaluation")),
            Ok(Err(e)) => {
                if e.is_retryable() {
                    // Fail closed but transient: the record stays in
                    // PolicyEvaluating for a later retry.
                    tracing::warn!(
                        action_id = %rec.action_id,
                        "policy gate unavailable: {e}"
                    );
                } else {
                    rec.fail(e.to_string())?;
                    self.audit.append(
                        rec.action_id.as_str(),
                        "action.failed",
                        json!({ "code": e.code(), "reason": e.to_string() }),
                    );
                }
                return Err(e);
            }
            Ok(Ok(decision)) => decision,
        };

        rec.policy_decision = Some(decision.clone());
        if decision.permits_progress() {
            rec.transition(ActionState::PolicyPassed)?;
        } else {
            // Blocking is an outcome, not an error, at this layer; `advance`
            // produces the caller-facing shape from the stored decision.
            rec.transition(ActionState::Blocked)?;
            self.audit.append(
                rec.action_id.as_str(),
                "action.blocked",
                json!({
                    "rule": decision.rule_applied,
                    "trace_id": decision.trace_id,
                }),
            );
        }
        Ok(())
    }

    /// From `PolicyPassed`, route to payment, admin skip, or finalize.
    fn resolve_payment_requirement(
        &self,
        rec: &mut ActionRecord,
        caller: &CallerContext,
    ) -> Result<Boundary, WorkflowError> {
        if caller.can_skip_payment() {
            rec.transition(ActionState::SkippedPayment)?;
            rec.payment_status = Some(PaymentStatus::SkippedAdmin);
            self.audit.append(
                rec.action_id.as_str(),
                "payment.skipped_admin",
                json!({
                    "actor_id": caller.actor_id,
                    "payment_status": "skipped_admin",
                }),
            );
            return Ok(Boundary::ReadyToFinalize);
        }

        if !rec.action_type.requires_payment() {
            rec.transition(ActionState::SkippedPayment)?;
            rec.payment_status = Some(PaymentStatus::NotRequired);
            return Ok(Boundary::ReadyToFinalize);
        }

        let descriptor = self.issuer.issue(
            &rec.action_id,
            rec.request.amount.clone(),
            rec.request.party.clone(),
            self.receiver.clone(),
        );
        rec.payment_descriptor = Some(descriptor.clone());
        rec.transition(ActionState::AwaitingPayment)?;
        self.audit.append(
            rec.action_id.as_str(),
            "payment.descriptor_issued",
            json!({
                "amount": descriptor.amount,
                "facilitator_url": descriptor.facilitator_url,
            }),
        );
        Ok(Boundary::Outcome(ActionOutcome::PaymentRequired {
            descriptor,
            requires_review: rec.requires_review(),
        }))
    }

    /// Run finalization on a detached task and await its result.
    ///
    /// The spawn is the point of no return: dropping the future returned by
    /// `execute`/`pay` (client went away) leaves the task running to
    /// `Completed` or `Failed`.
    async fn finalize_detached(
        &self,
        cell: Arc<Mutex<ActionRecord>>,
    ) -> Result<ActionOutcome, WorkflowError> {
        let finalizers = self.finalizers.clone();
        let audit = self.audit.clone();
        let config = self.config.clone();

        let handle = tokio::spawn(finalize_task(cell, finalizers, audit, config));
        match handle.await {
            Ok(result) => result.map(|record| ActionOutcome::Completed { record }),
            Err(e) => Err(WorkflowError::Internal(format!(
                "finalization task aborted: {e}"
            ))),
        }
    }

    /// Record a timeout, failing the action once the bound is exhausted.
    fn note_timeout(&self, rec: &mut ActionRecord, operation: &str) -> WorkflowError {
        rec.timeout_attempts += 1;
        tracing::warn!(
            action_id = %rec.action_id,
            operation,
            attempt = rec.timeout_attempts,
            max = self.config.max_timeout_attempts,
            "bounded operation timed out"
        );
        if rec.timeout_attempts >= self.config.max_timeout_attempts {
            let reason = format!("Timeout: {operation} exceeded {} attempts", rec.timeout_attempts);
            if rec.fail(reason.clone()).is_ok() {
                self.audit.append(
                    rec.action_id.as_str(),
                    "action.failed",
                    json!({ "code": "TIMEOUT", "reason": reason }),
                );
            }
        }
        WorkflowError::Timeout {
            operation: operation.to_string(),
        }
    }

    /// Reconstruct the blocked outcome from the stored decision.
    fn blocked_error(&self, rec: &ActionRecord) -> WorkflowError {
        match &rec.policy_decision {
            Some(d) => WorkflowError::PolicyBlocked {
                rule: d.rule_applied.clone(),
                trace_id: d.trace_id,
            },
            None => WorkflowError::Internal(format!(
                "action {} is blocked without a stored decision",
                rec.action_id
            )),
        }
    }
}

/// The detached finalization task.
///
/// Holds the per-key lock across the finalizer call so a concurrent drive
/// cannot start a second side effect; whoever locks next observes
/// `Completed` (or `Failed`) and returns without re-running it.
async fn finalize_task(
    cell: Arc<Mutex<ActionRecord>>,
    finalizers: HashMap<ActionType, Arc<dyn ActionFinalizer>>,
    audit: Arc<AuditLog>,
    config: EngineConfig,
) -> Result<ActionRecord, WorkflowError> {
    let mut rec = cell.lock().await;

    match rec.state {
        ActionState::Completed => return Ok(rec.clone()),
        ActionState::Paid | ActionState::SkippedPayment => {}
        other => {
            return Err(WorkflowError::InvalidState {
                action_id: rec.action_id.to_string(),
                state: other.to_string(),
                operation: "finalize".to_string(),
            })
        }
    }

    let finalizer = finalizers.get(&rec.action_type).cloned().ok_or_else(|| {
        WorkflowError::Internal(format!(
            "no finalizer registered for action type {}",
            rec.action_type
        ))
    })?;

    let finalized = tokio::time::timeout(config.operation_timeout, finalizer.finalize(&rec)).await;
    let paid = rec.payment_status == Some(PaymentStatus::Paid);

    match finalized {
        Err(_elapsed) => {
            rec.timeout_attempts += 1;
            if rec.timeout_attempts >= config.max_timeout_attempts {
                // Payment was taken and the side effect is in doubt.
                rec.needs_reconciliation = paid;
                let reason = format!(
                    "Timeout: finalization exceeded {} attempts",
                    rec.timeout_attempts
                );
                if rec.fail(reason.clone()).is_ok() {
                    audit.append(
                        rec.action_id.as_str(),
                        "action.failed",
                        json!({
                            "code": "TIMEOUT",
                            "reason": reason,
                            "needs_reconciliation": paid,
                        }),
                    );
                }
            }
            Err(WorkflowError::Timeout {
                operation: "finalization".to_string(),
            })
        }
        Ok(Err(e)) => {
            // The most sensitive failure: payment may already be taken.
            rec.needs_reconciliation = paid;
            rec.fail(format!("downstream settlement failed: {e}"))?;
            audit.append(
                rec.action_id.as_str(),
                "action.finalize_failed",
                json!({ "reason": e.to_string(), "needs_reconciliation": paid }),
            );
            tracing::error!(
                action_id = %rec.action_id,
                needs_reconciliation = paid,
                "finalization failed after payment resolution: {e}"
            );
            Err(WorkflowError::DownstreamSettlement(e.to_string()))
        }
        Ok(Ok(result)) => {
            rec.result = Some(result);
            rec.transition(ActionState::Completed)?;
            audit.append(
                rec.action_id.as_str(),
                "action.completed",
                json!({ "payment_status": rec.payment_status }),
            );
            tracing::info!(action_id = %rec.action_id, "action completed");
            Ok(rec.clone())
        }
    }
}
