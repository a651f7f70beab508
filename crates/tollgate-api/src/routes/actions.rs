// SPDX-License-Identifier: BUSL-1.1
//! # Action Workflow API
//!
//! Endpoints driving the payment-gated action workflow:
//!
//! - `POST /v1/actions/:action_id/execute` — start or resume an action.
//!   Returns 200 when the action completes, 402 with a payment descriptor
//!   when payment is outstanding, 403 when policy blocks it.
//! - `POST /v1/actions/:action_id/pay` — submit a payment payload.
//! - `GET  /v1/actions/:action_id` — inspect the action record.
//!
//! The `action_id` path segment is the idempotency key: re-requesting with
//! the same id attaches to the existing execution and never re-charges.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use tollgate_core::{
    ActionId, ActionParty, ActionRequest, ActionType, CallerContext, MoneyAmount, WorkflowError,
};
use tollgate_engine::{ActionOutcome, ActionRecord, PaymentStatus};
use tollgate_payment::{PaymentDescriptor, PaymentPayload};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

// ── Request types ───────────────────────────────────────────────

/// The kind of action to execute.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionTypeInput {
    Settlement,
    Notarization,
}

impl From<ActionTypeInput> for ActionType {
    fn from(input: ActionTypeInput) -> Self {
        match input {
            ActionTypeInput::Settlement => ActionType::Settlement,
            ActionTypeInput::Notarization => ActionType::Notarization,
        }
    }
}

/// A monetary amount: ISO 4217 currency code and decimal string value.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AmountInput {
    pub currency: String,
    /// Decimal string, e.g. "50000" or "50.25". Never a float.
    pub value: String,
}

impl AmountInput {
    fn into_amount(self) -> MoneyAmount {
        MoneyAmount::new(self.currency, self.value)
    }
}

/// A party to the action.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PartyInput {
    pub party_id: String,
    pub name: Option<String>,
    pub external_ref: Option<String>,
}

impl From<PartyInput> for ActionParty {
    fn from(input: PartyInput) -> Self {
        ActionParty {
            party_id: input.party_id,
            name: input.name,
            external_ref: input.external_ref,
        }
    }
}

/// Request to execute (or resume) an action.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ExecuteActionRequest {
    pub action_type: ActionTypeInput,
    pub amount: AmountInput,
    pub party: PartyInput,
    pub counterparty: Option<PartyInput>,
    /// Reference to the entity acted on (trade id, document id).
    pub reference: Option<String>,
    pub metadata: Option<Value>,
    /// Request the admin payment bypass. Ignored for non-admin callers.
    #[serde(default)]
    pub skip_payment: bool,
}

impl Validate for ExecuteActionRequest {
    fn validate(&self) -> Result<(), String> {
        if self.amount.currency.trim().is_empty() {
            return Err("amount.currency must be non-empty".into());
        }
        if self.amount.value.trim().is_empty() {
            return Err("amount.value must be non-empty".into());
        }
        if self.party.party_id.trim().is_empty() {
            return Err("party.party_id must be non-empty".into());
        }
        Ok(())
    }
}

impl ExecuteActionRequest {
    fn into_action_request(self) -> ActionRequest {
        ActionRequest {
            amount: self.amount.into_amount(),
            party: self.party.into(),
            counterparty: self.counterparty.map(Into::into),
            reference: self.reference,
            metadata: self.metadata,
        }
    }
}

/// A payment payload for an outstanding descriptor.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PaymentSubmission {
    pub amount: AmountInput,
    /// Opaque rail-specific payment instrument (e.g. a signed transfer).
    pub instrument: Value,
}

impl Validate for PaymentSubmission {
    fn validate(&self) -> Result<(), String> {
        if self.amount.currency.trim().is_empty() || self.amount.value.trim().is_empty() {
            return Err("amount must carry a currency and a value".into());
        }
        if self.instrument.is_null() {
            return Err("instrument must be present".into());
        }
        Ok(())
    }
}

// ── Response types ──────────────────────────────────────────────

/// A payment descriptor, returned with HTTP 402.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DescriptorOutput {
    pub action_id: String,
    pub amount: AmountInput,
    pub payer_id: String,
    pub receiver_id: String,
    /// Endpoint where the payment is settled out-of-band.
    pub facilitator_url: String,
    pub issued_at: DateTime<Utc>,
}

impl DescriptorOutput {
    fn from_descriptor(d: &PaymentDescriptor) -> Self {
        Self {
            action_id: d.action_id.to_string(),
            amount: AmountInput {
                currency: d.amount.currency.clone(),
                value: d.amount.value.clone(),
            },
            payer_id: d.payer.party_id.clone(),
            receiver_id: d.receiver.party_id.clone(),
            facilitator_url: d.facilitator_url.clone(),
            issued_at: d.issued_at,
        }
    }
}

/// Body of the 402 Payment Required response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentRequiredResponse {
    pub action_id: String,
    pub state: String,
    /// True when the policy decision was FLAG.
    pub requires_review: bool,
    pub payment: DescriptorOutput,
}

/// Snapshot of an action record.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActionResponse {
    pub action_id: String,
    pub action_type: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,
    pub requires_review: bool,
    pub needs_reconciliation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_applied: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActionResponse {
    fn from_record(record: &ActionRecord) -> Self {
        Self {
            action_id: record.action_id.to_string(),
            action_type: record.action_type.to_string(),
            state: record.state.to_string(),
            payment_status: record.payment_status.map(|s| {
                match s {
                    PaymentStatus::NotRequired => "not_required",
                    PaymentStatus::Paid => "paid",
                    PaymentStatus::SkippedAdmin => "skipped_admin",
                }
                .to_string()
            }),
            requires_review: record.requires_review(),
            needs_reconciliation: record.needs_reconciliation,
            rule_applied: record
                .policy_decision
                .as_ref()
                .and_then(|d| d.rule_applied.clone()),
            trace_id: record.policy_decision.as_ref().map(|d| d.trace_id),
            transaction_hash: record
                .payment_proof
                .as_ref()
                .map(|p| p.transaction_hash.clone()),
            result: record.result.clone(),
            failure_reason: record.failure_reason.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

// ── Router ──────────────────────────────────────────────────────

/// Build the action workflow router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/actions/:action_id/execute", post(execute_action))
        .route("/v1/actions/:action_id/pay", post(submit_payment))
        .route("/v1/actions/:action_id", get(get_action))
}

fn parse_action_id(raw: &str) -> Result<ActionId, AppError> {
    ActionId::new(raw).map_err(AppError::from)
}

// ── Handlers ────────────────────────────────────────────────────

/// POST /v1/actions/:action_id/execute — Start or resume an action.
///
/// Idempotent on `action_id`. A repeated request observes the current
/// state: the same 402 descriptor while payment is outstanding, the final
/// result once completed, the same block once blocked.
#[utoipa::path(
    post,
    path = "/v1/actions/{action_id}/execute",
    params(("action_id" = String, Path, description = "Idempotency key for the action")),
    request_body = ExecuteActionRequest,
    responses(
        (status = 200, description = "Action completed", body = ActionResponse),
        (status = 402, description = "Payment required", body = PaymentRequiredResponse),
        (status = 403, description = "Blocked by policy", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid payload", body = crate::error::ErrorBody),
    ),
    tag = "actions"
)]
async fn execute_action(
    State(state): State<AppState>,
    Path(action_id): Path<String>,
    Extension(identity): Extension<CallerIdentity>,
    body: Result<Json<ExecuteActionRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let action_id = parse_action_id(&action_id)?;
    let req = extract_validated_json(body)?;

    let caller = CallerContext {
        actor_id: identity.actor_id,
        role: identity.role,
        skip_payment: req.skip_payment,
    };
    let action_type: ActionType = req.action_type.into();
    let request = req.into_action_request();

    let outcome = state
        .engine
        .execute(action_id.clone(), action_type, request, caller)
        .await?;

    Ok(match outcome {
        ActionOutcome::Completed { record } => {
            (StatusCode::OK, Json(ActionResponse::from_record(&record))).into_response()
        }
        ActionOutcome::PaymentRequired {
            descriptor,
            requires_review,
        } => (
            StatusCode::PAYMENT_REQUIRED,
            Json(PaymentRequiredResponse {
                action_id: action_id.to_string(),
                state: "awaiting_payment".to_string(),
                requires_review,
                payment: DescriptorOutput::from_descriptor(&descriptor),
            }),
        )
            .into_response(),
        ActionOutcome::Blocked { rule, trace_id } => {
            return Err(AppError::from(WorkflowError::PolicyBlocked { rule, trace_id }))
        }
    })
}

/// POST /v1/actions/:action_id/pay — Submit payment for an action.
///
/// On success the action is finalized and the completed record returned.
/// A rejected payload (mismatch, transient rail failure) leaves the action
/// awaiting payment; a replay of an accepted payload is 409.
#[utoipa::path(
    post,
    path = "/v1/actions/{action_id}/pay",
    params(("action_id" = String, Path, description = "Idempotency key for the action")),
    request_body = PaymentSubmission,
    responses(
        (status = 200, description = "Payment accepted, action completed", body = ActionResponse),
        (status = 404, description = "Unknown action", body = crate::error::ErrorBody),
        (status = 409, description = "Duplicate payment or wrong state", body = crate::error::ErrorBody),
        (status = 422, description = "Amount mismatch or invalid payload", body = crate::error::ErrorBody),
    ),
    tag = "actions"
)]
async fn submit_payment(
    State(state): State<AppState>,
    Path(action_id): Path<String>,
    body: Result<Json<PaymentSubmission>, JsonRejection>,
) -> Result<Response, AppError> {
    let action_id = parse_action_id(&action_id)?;
    let req = extract_validated_json(body)?;

    let payload = PaymentPayload {
        action_id: action_id.clone(),
        amount: req.amount.into_amount(),
        instrument: req.instrument,
    };

    let outcome = state.engine.pay(action_id, payload).await?;

    match outcome {
        ActionOutcome::Completed { record } => {
            Ok((StatusCode::OK, Json(ActionResponse::from_record(&record))).into_response())
        }
        // `ActionEngine::pay` resolves to `Completed` or an error: a payment
        // submission can never re-enter the 402 handshake or the policy
        // gate, so `PaymentRequired` and `Blocked` cannot reach this arm.
        other => {
            debug_assert!(false, "pay returned non-terminal outcome: {other:?}");
            Err(AppError::Internal(
                "unexpected outcome from payment submission".to_string(),
            ))
        }
    }
}

/// GET /v1/actions/:action_id — Inspect the action record.
#[utoipa::path(
    get,
    path = "/v1/actions/{action_id}",
    params(("action_id" = String, Path, description = "Idempotency key for the action")),
    responses(
        (status = 200, description = "Action record", body = ActionResponse),
        (status = 404, description = "Unknown action", body = crate::error::ErrorBody),
    ),
    tag = "actions"
)]
async fn get_action(
    State(state): State<AppState>,
    Path(action_id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    let action_id = parse_action_id(&action_id)?;
    let record = state
        .engine
        .get(&action_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("action {action_id} not found")))?;
    Ok(Json(ActionResponse::from_record(&record)))
}
