// SPDX-License-Identifier: BUSL-1.1
//! # Workflow Orchestrator
//!
//! Drives an action from the caller's side: execute, answer the 402 with a
//! signed payment, resubmit on transient failures. The orchestrator NEVER
//! mints a new `action_id` on retry — the id is the idempotency key, and
//! reusing it is what makes retrying safe.
//!
//! Retry discipline:
//! - Policy blocks, amount mismatches, and validation errors are returned
//!   immediately; retrying cannot change them.
//! - Transport failures, 5xx responses, and server-flagged transient errors
//!   back off exponentially up to the attempt bound. The run loop is the
//!   only retry layer; each attempt issues one HTTP call per endpoint.
//! - A `DUPLICATE_PAYMENT` conflict after a lost response means the earlier
//!   payment landed; the final record is fetched instead of failing.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ClientError;
use crate::signer::PaymentSigner;
use crate::types::{ActionView, ErrorBody, ExecuteRequest, PaymentRequest, PaymentRequired};

/// Default attempt bound for [`WorkflowClient::run_action`].
const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Base delay for the exponential backoff between attempts.
const BACKOFF_BASE_MS: u64 = 200;

/// Delay before the attempt following `completed` finished attempts.
///
/// Doubles per attempt, capped so the shift cannot overflow: 200ms, 400ms,
/// 800ms, ... up to 12.8s.
fn backoff_delay(completed: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS << completed.min(6))
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the workflow API.
    pub base_url: String,
    /// Optional bearer token.
    pub auth_token: Option<String>,
    /// Optional actor id sent as `x-actor-id` for the audit trail.
    pub actor_id: Option<String>,
    /// Request timeout in seconds (default: 30).
    pub timeout_secs: u64,
    /// Total attempts for the execute/pay loop (default: 4).
    pub max_attempts: u32,
}

impl ClientConfig {
    /// Configuration with default timeout and attempt bound.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
            actor_id: None,
            timeout_secs: 30,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Outcome of a single execute call.
enum ExecuteOutcome {
    Completed(Box<ActionView>),
    PaymentRequired(Box<PaymentRequired>),
}

/// HTTP client for the workflow API.
#[derive(Debug)]
pub struct WorkflowClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl WorkflowClient {
    /// Build the client from configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = &config.auth_token {
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ClientError::Config("invalid auth token characters".to_string()))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        if let Some(actor) = &config.actor_id {
            if let Ok(value) = reqwest::header::HeaderValue::from_str(actor) {
                headers.insert("x-actor-id", value);
            }
        }
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Drive `action_id` to completion (or a terminal refusal).
    ///
    /// Resolves the full handshake: execute, sign the 402 descriptor, pay.
    /// Transient failures are retried with backoff against the SAME
    /// `action_id`; the server's idempotency guarantees make that safe.
    pub async fn run_action(
        &self,
        action_id: &str,
        request: &ExecuteRequest,
        signer: &dyn PaymentSigner,
    ) -> Result<ActionView, ClientError> {
        let mut last_failure: Option<ClientError> = None;

        for attempt in 0..self.config.max_attempts {
            if attempt > 0 {
                let delay = backoff_delay(attempt - 1);
                tracing::warn!(
                    action_id,
                    attempt = attempt + 1,
                    max_attempts = self.config.max_attempts,
                    "retrying workflow in {delay:?}"
                );
                tokio::time::sleep(delay).await;
            }

            let outcome = match self.execute_once(action_id, request).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_retryable() => {
                    last_failure = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let required = match outcome {
                ExecuteOutcome::Completed(view) => return Ok(*view),
                ExecuteOutcome::PaymentRequired(required) => required,
            };

            let instrument = signer
                .sign_payment(&required.payment)
                .await
                .map_err(|e| ClientError::Signer(e.to_string()))?;
            let payment = PaymentRequest {
                amount: required.payment.amount.clone(),
                instrument,
            };

            match self.pay_once(action_id, &payment).await {
                Ok(view) => return Ok(view),
                Err(ClientError::Api { code, .. }) if code == "DUPLICATE_PAYMENT" => {
                    // A previous attempt's payment landed but its response
                    // was lost. The action is already settled; fetch it.
                    tracing::info!(action_id, "payment already consumed, fetching record");
                    return self.get_action(action_id).await;
                }
                Err(e) if e.is_retryable() => {
                    last_failure = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(ClientError::RetriesExhausted {
            attempts: self.config.max_attempts,
            last: last_failure
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no failure recorded".to_string()),
        })
    }

    /// Fetch the record for `action_id`.
    pub async fn get_action(&self, action_id: &str) -> Result<ActionView, ClientError> {
        let endpoint = format!("{}/v1/actions/{action_id}", self.base_url());
        let resp = self
            .http
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;
        self.parse_view(&endpoint, resp).await
    }

    async fn execute_once(
        &self,
        action_id: &str,
        request: &ExecuteRequest,
    ) -> Result<ExecuteOutcome, ClientError> {
        let endpoint = format!("{}/v1/actions/{action_id}/execute", self.base_url());
        let resp = self.post_json(&endpoint, request).await?;
        let status = resp.status();
        let bytes = self.read_body(&endpoint, resp).await?;

        match status {
            StatusCode::OK => {
                let view = parse_json(&endpoint, &bytes)?;
                Ok(ExecuteOutcome::Completed(Box::new(view)))
            }
            StatusCode::PAYMENT_REQUIRED => {
                let required = parse_json(&endpoint, &bytes)?;
                Ok(ExecuteOutcome::PaymentRequired(Box::new(required)))
            }
            _ => Err(parse_error(&endpoint, status.as_u16(), &bytes)),
        }
    }

    async fn pay_once(
        &self,
        action_id: &str,
        payment: &PaymentRequest,
    ) -> Result<ActionView, ClientError> {
        let endpoint = format!("{}/v1/actions/{action_id}/pay", self.base_url());
        let resp = self.post_json(&endpoint, payment).await?;
        self.parse_view(&endpoint, resp).await
    }

    async fn post_json<T: Serialize>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<reqwest::Response, ClientError> {
        self.http
            .post(endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.to_string(),
                source: e,
            })
    }

    async fn parse_view(
        &self,
        endpoint: &str,
        resp: reqwest::Response,
    ) -> Result<ActionView, ClientError> {
        let status = resp.status();
        let bytes = self.read_body(endpoint, resp).await?;
        if status == StatusCode::OK {
            parse_json(endpoint, &bytes)
        } else {
            Err(parse_error(endpoint, status.as_u16(), &bytes))
        }
    }

    async fn read_body(
        &self,
        endpoint: &str,
        resp: reqwest::Response,
    ) -> Result<Vec<u8>, ClientError> {
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.to_string(),
                source: e,
            })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(
    endpoint: &str,
    bytes: &[u8],
) -> Result<T, ClientError> {
    serde_json::from_slice(bytes).map_err(|e| ClientError::Deserialization {
        endpoint: endpoint.to_string(),
        source: e,
    })
}

/// Map a non-success response to a typed client error.
fn parse_error(endpoint: &str, status: u16, bytes: &[u8]) -> ClientError {
    let body: Option<ErrorBody> = serde_json::from_slice(bytes).ok();
    let Some(body) = body else {
        return ClientError::Api {
            endpoint: endpoint.to_string(),
            status,
            code: "UNKNOWN".to_string(),
            message: String::from_utf8_lossy(bytes).into_owned(),
            retryable: status >= 500,
        };
    };

    if body.error.code == "POLICY_BLOCKED" {
        let details = body.error.details.unwrap_or_default();
        let rule = details
            .get("rule")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let trace_id = details
            .get("trace_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_default();
        return ClientError::Blocked { rule, trace_id };
    }

    ClientError::Api {
        endpoint: endpoint.to_string(),
        status,
        code: body.error.code,
        message: body.error.message,
        retryable: body.error.retryable,
    }
}
