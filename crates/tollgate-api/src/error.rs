// SPDX-License-Identifier: BUSL-1.1
//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps [`WorkflowError`] variants to HTTP status codes and JSON error
//! bodies with a machine-readable code, a message, and optional details.
//! Internal error details are never exposed in responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use tollgate_core::WorkflowError;

/// Structured JSON error response body.
///
/// All error responses share this shape. `details` carries structured
/// context for client errors (the blocking rule, the expected amount) and
/// is omitted for 500-class errors.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "POLICY_BLOCKED").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional context, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Whether retrying the same request (same `action_id`) can succeed.
    pub retryable: bool,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Authentication failure — missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Internal server error (500). Logged but not returned to clients.
    #[error("internal error: {0}")]
    Internal(String),

    /// A typed workflow error, mapped per-variant in [`status_and_code`].
    #[error(transparent)]
    Workflow(WorkflowError),
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        // Normalize the variants with direct HTTP counterparts; the rest
        // keep their typed shape for per-variant status and details.
        match err {
            WorkflowError::NotFound(m) => Self::NotFound(m),
            WorkflowError::InvalidActionPayload(m) => Self::Validation(m),
            WorkflowError::Internal(m) => Self::Internal(m),
            other => Self::Workflow(other),
        }
    }
}

impl AppError {
    /// HTTP status and machine-readable code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::Workflow(err) => {
                let status = match err {
                    WorkflowError::PolicyBlocked { .. } => StatusCode::FORBIDDEN,
                    WorkflowError::AmountMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    WorkflowError::DuplicatePayment | WorkflowError::InvalidState { .. } => {
                        StatusCode::CONFLICT
                    }
                    WorkflowError::PaymentRailError { permanent: true, .. } => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    WorkflowError::PaymentRailError { .. }
                    | WorkflowError::DownstreamSettlement(_) => StatusCode::BAD_GATEWAY,
                    WorkflowError::PolicyGateUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                    WorkflowError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
                    WorkflowError::InvalidActionPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    WorkflowError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.code())
            }
        }
    }

    /// Structured context surfaced alongside client errors.
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Workflow(WorkflowError::PolicyBlocked { rule, trace_id }) => {
                Some(serde_json::json!({ "rule": rule, "trace_id": trace_id }))
            }
            Self::Workflow(WorkflowError::AmountMismatch { expected, got }) => {
                Some(serde_json::json!({ "expected": expected, "got": got }))
            }
            Self::Workflow(WorkflowError::InvalidState { state, operation, .. }) => {
                Some(serde_json::json!({ "state": state, "operation": operation }))
            }
            _ => None,
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Workflow(err) => err.is_retryable(),
            Self::Internal(_) => true,
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal or downstream error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::Workflow(WorkflowError::DownstreamSettlement(_)) => {
                "Finalization failed after payment; the action is flagged for reconciliation"
                    .to_string()
            }
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Workflow(WorkflowError::DownstreamSettlement(_)) => {
                tracing::error!(error = %self, "downstream settlement failure")
            }
            Self::Workflow(WorkflowError::PolicyGateUnavailable(_)) => {
                tracing::warn!(error = %self, "policy gate unavailable")
            }
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self.details(),
                retryable: self.retryable(),
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use uuid::Uuid;

    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[test]
    fn not_found_status_code() {
        let (status, code) = AppError::NotFound("action a-1".into()).status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn workflow_variants_normalize_on_conversion() {
        let err = AppError::from(WorkflowError::NotFound("a-1".into()));
        assert!(matches!(err, AppError::NotFound(_)));
        let err = AppError::from(WorkflowError::InvalidActionPayload("bad".into()));
        assert!(matches!(err, AppError::Validation(_)));
        let err = AppError::from(WorkflowError::Internal("storage".into()));
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn blocked_maps_to_forbidden() {
        let err = AppError::from(WorkflowError::PolicyBlocked {
            rule: Some("amount-cap".into()),
            trace_id: Uuid::new_v4(),
        });
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(code, "POLICY_BLOCKED");
    }

    #[test]
    fn duplicate_payment_maps_to_conflict() {
        let err = AppError::from(WorkflowError::DuplicatePayment);
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "DUPLICATE_PAYMENT");
    }

    #[test]
    fn rail_permanence_splits_status() {
        let permanent = AppError::from(WorkflowError::PaymentRailError {
            message: "account closed".into(),
            permanent: true,
        });
        assert_eq!(permanent.status_and_code().0, StatusCode::UNPROCESSABLE_ENTITY);

        let transient = AppError::from(WorkflowError::PaymentRailError {
            message: "503".into(),
            permanent: false,
        });
        assert_eq!(transient.status_and_code().0, StatusCode::BAD_GATEWAY);
        assert!(transient.retryable());
    }

    #[test]
    fn timeout_maps_to_gateway_timeout() {
        let err = AppError::from(WorkflowError::Timeout {
            operation: "policy evaluation".into(),
        });
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(code, "TIMEOUT");
        assert!(err.retryable());
    }

    #[tokio::test]
    async fn into_response_blocked_carries_rule_details() {
        let trace_id = Uuid::new_v4();
        let (status, body) = response_parts(AppError::from(WorkflowError::PolicyBlocked {
            rule: Some("amount-cap".into()),
            trace_id,
        }))
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let details = body.error.details.expect("details");
        assert_eq!(details["rule"], "amount-cap");
        assert_eq!(details["trace_id"], trace_id.to_string());
        assert!(!body.error.retryable);
    }

    #[tokio::test]
    async fn into_response_amount_mismatch_carries_amounts() {
        let (status, body) = response_parts(AppError::from(WorkflowError::AmountMismatch {
            expected: "50.00 USD".into(),
            got: "40.00 USD".into(),
        }))
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.error.code, "AMOUNT_MISMATCH");
        let details = body.error.details.expect("details");
        assert_eq!(details["expected"], "50.00 USD");
    }

    #[tokio::test]
    async fn into_response_internal_hides_details() {
        let (status, body) =
            response_parts(AppError::Internal("db connection failed".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            !body.error.message.contains("db connection"),
            "internal error details must not leak: {}",
            body.error.message
        );
        assert_eq!(body.error.message, "An internal error occurred");
    }

    #[tokio::test]
    async fn into_response_downstream_settlement_hides_cause() {
        let (status, body) = response_parts(AppError::from(WorkflowError::DownstreamSettlement(
            "ledger row lock".into(),
        )))
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.error.code, "DOWNSTREAM_SETTLEMENT");
        assert!(!body.error.message.contains("ledger row lock"));
        assert!(body.error.message.contains("reconciliation"));
    }
}
