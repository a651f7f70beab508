// SPDX-License-Identifier: BUSL-1.1
//! # Payment Rail Adapters
//!
//! The [`PaymentRail`] trait abstracts over the external facilitator that
//! actually moves money. Production deployments use [`HttpFacilitatorRail`]
//! against a live facilitator endpoint; tests and local development use
//! [`MockPaymentRail`].
//!
//! Rail failures distinguish transient conditions (the caller may retry the
//! same action) from permanent ones (the rail will never settle this
//! payload). HTTP mapping: transport errors and 5xx are transient, 4xx is
//! permanent.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use tollgate_core::WorkflowError;

use crate::descriptor::{PaymentDescriptor, PaymentPayload};

/// Error from the payment rail.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct RailError {
    /// The rail's message, surfaced verbatim.
    pub message: String,
    /// True when the rail marked the failure permanent.
    pub permanent: bool,
}

impl RailError {
    /// A retryable failure (outage, timeout, 5xx).
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            permanent: false,
        }
    }

    /// A non-retryable failure (rejected instrument, closed account).
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            permanent: true,
        }
    }
}

impl From<RailError> for WorkflowError {
    fn from(e: RailError) -> Self {
        WorkflowError::PaymentRailError {
            message: e.message,
            permanent: e.permanent,
        }
    }
}

/// Successful settlement receipt from the rail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RailReceipt {
    /// Opaque settlement identifier (e.g. an on-chain transaction hash).
    pub transaction_hash: String,
}

/// The external payment rail capability.
///
/// Implementations are `Send + Sync` and shared via `Arc` across tasks.
#[async_trait]
pub trait PaymentRail: Send + Sync {
    /// Settle `payload` against `descriptor`, returning the rail's receipt.
    async fn settle(
        &self,
        descriptor: &PaymentDescriptor,
        payload: &PaymentPayload,
    ) -> Result<RailReceipt, RailError>;

    /// Short name for logs.
    fn rail_name(&self) -> &str;
}

// ─── Mock rail ──────────────────────────────────────────────────────────

/// Scripted outcome for the next [`MockPaymentRail::settle`] call.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Settle successfully with a deterministic transaction hash.
    Succeed,
    /// Fail with a retryable rail error.
    FailTransient(String),
    /// Fail with a permanent rail error.
    FailPermanent(String),
}

/// In-process rail for tests and local development.
///
/// Counts settle calls and optionally delays to exercise timeout paths.
/// Scripted outcomes are consumed in order; once exhausted, every call
/// succeeds.
pub struct MockPaymentRail {
    script: Mutex<Vec<MockOutcome>>,
    settle_calls: AtomicU32,
    delay: Option<Duration>,
}

impl Default for MockPaymentRail {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPaymentRail {
    /// A rail that always succeeds.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            settle_calls: AtomicU32::new(0),
            delay: None,
        }
    }

    /// A rail that plays `outcomes` front-to-back, then succeeds.
    pub fn scripted(outcomes: Vec<MockOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes),
            settle_calls: AtomicU32::new(0),
            delay: None,
        }
    }

    /// Delay every settle call (for timeout tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of settle calls observed.
    pub fn settle_calls(&self) -> u32 {
        self.settle_calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> MockOutcome {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        if script.is_empty() {
            MockOutcome::Succeed
        } else {
            script.remove(0)
        }
    }
}

#[async_trait]
impl PaymentRail for MockPaymentRail {
    async fn settle(
        &self,
        _descriptor: &PaymentDescriptor,
        payload: &PaymentPayload,
    ) -> Result<RailReceipt, RailError> {
        self.settle_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.next_outcome() {
            MockOutcome::Succeed => {
                let mut hasher = Sha256::new();
                hasher.update(b"mock-rail:");
                hasher.update(payload.digest().as_bytes());
                let hash: String = hasher
                    .finalize()
                    .iter()
                    .map(|b| format!("{b:02x}"))
                    .collect();
                Ok(RailReceipt {
                    transaction_hash: format!("0x{hash}"),
                })
            }
            MockOutcome::FailTransient(msg) => Err(RailError::transient(msg)),
            MockOutcome::FailPermanent(msg) => Err(RailError::permanent(msg)),
        }
    }

    fn rail_name(&self) -> &str {
        "mock"
    }
}

// ─── HTTP facilitator rail ──────────────────────────────────────────────

/// Configuration for the HTTP facilitator rail.
#[derive(Debug, Clone)]
pub struct FacilitatorConfig {
    /// Base URL of the facilitator API.
    pub base_url: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 30).
    pub timeout_secs: u64,
}

impl FacilitatorConfig {
    /// Create a configuration with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Serialize)]
struct SettleRequest<'a> {
    action_id: &'a str,
    amount: &'a tollgate_core::MoneyAmount,
    instrument: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SettleResponse {
    transaction_hash: String,
}

/// HTTP client for a live x402 facilitator endpoint.
///
/// Wraps a `reqwest::Client` with the facilitator base URL, optional bearer
/// auth, and a per-request timeout. `Send + Sync`; share via `Arc`.
#[derive(Debug)]
pub struct HttpFacilitatorRail {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFacilitatorRail {
    /// Build the rail from configuration.
    pub fn new(config: FacilitatorConfig) -> Result<Self, RailError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| RailError::permanent("invalid API key characters"))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| RailError::transient(format!("failed to build HTTP client: {e}")))?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl PaymentRail for HttpFacilitatorRail {
    async fn settle(
        &self,
        _descriptor: &PaymentDescriptor,
        payload: &PaymentPayload,
    ) -> Result<RailReceipt, RailError> {
        let url = format!("{}/settle", self.base_url);
        let body = SettleRequest {
            action_id: payload.action_id.as_str(),
            amount: &payload.amount,
            instrument: &payload.instrument,
        };

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RailError::transient(format!("facilitator timeout: {e}"))
                } else {
                    RailError::transient(format!("facilitator unreachable: {e}"))
                }
            })?;

        let status = resp.status();
        if status.is_client_error() {
            let excerpt = resp.text().await.unwrap_or_default();
            return Err(RailError::permanent(format!(
                "facilitator rejected payment: HTTP {status} — {excerpt}"
            )));
        }
        if status.is_server_error() {
            let excerpt = resp.text().await.unwrap_or_default();
            return Err(RailError::transient(format!(
                "facilitator error: HTTP {status} — {excerpt}"
            )));
        }

        let parsed: SettleResponse = resp
            .json()
            .await
            .map_err(|e| RailError::transient(format!("malformed facilitator response: {e}")))?;
        Ok(RailReceipt {
            transaction_hash: parsed.transaction_hash,
        })
    }

    fn rail_name(&self) -> &str {
        "http-facilitator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use tollgate_core::{ActionId, ActionParty, MoneyAmount};

    fn descriptor() -> PaymentDescriptor {
        PaymentDescriptor {
            action_id: ActionId::new("a-1").unwrap(),
            amount: MoneyAmount::new("USD", "50.00"),
            payer: ActionParty::new("payer-1"),
            receiver: ActionParty::new("receiver-1"),
            facilitator_url: "https://facilitator.example/v1".to_string(),
            issued_at: Utc::now(),
        }
    }

    fn payload() -> PaymentPayload {
        PaymentPayload {
            action_id: ActionId::new("a-1").unwrap(),
            amount: MoneyAmount::new("USD", "50.00"),
            instrument: json!({ "transfer": "blob" }),
        }
    }

    #[tokio::test]
    async fn mock_rail_succeeds_by_default() {
        let rail = MockPaymentRail::new();
        let receipt = rail.settle(&descriptor(), &payload()).await.expect("settle");
        assert!(receipt.transaction_hash.starts_with("0x"));
        assert_eq!(rail.settle_calls(), 1);
    }

    #[tokio::test]
    async fn mock_rail_hash_is_deterministic_per_payload() {
        let rail = MockPaymentRail::new();
        let r1 = rail.settle(&descriptor(), &payload()).await.unwrap();
        let r2 = rail.settle(&descriptor(), &payload()).await.unwrap();
        assert_eq!(r1.transaction_hash, r2.transaction_hash);
    }

    #[tokio::test]
    async fn mock_rail_plays_script_then_succeeds() {
        let rail = MockPaymentRail::scripted(vec![
            MockOutcome::FailTransient("rail outage".into()),
            MockOutcome::FailPermanent("account closed".into()),
        ]);

        let e1 = rail.settle(&descriptor(), &payload()).await.unwrap_err();
        assert!(!e1.permanent);
        let e2 = rail.settle(&descriptor(), &payload()).await.unwrap_err();
        assert!(e2.permanent);
        assert!(rail.settle(&descriptor(), &payload()).await.is_ok());
        assert_eq!(rail.settle_calls(), 3);
    }

    #[test]
    fn rail_error_maps_to_workflow_error() {
        let err: WorkflowError = RailError::permanent("account closed").into();
        match err {
            WorkflowError::PaymentRailError { message, permanent } => {
                assert_eq!(message, "account closed");
                assert!(permanent);
            }
            other => panic!("expected PaymentRailError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_rail_reports_unreachable_as_transient() {
        // Guaranteed-closed port → connection refused.
        let mut config = FacilitatorConfig::new("http://127.0.0.1:1");
        config.timeout_secs = 1;
        let rail = HttpFacilitatorRail::new(config).expect("build rail");
        let err = rail.settle(&descriptor(), &payload()).await.unwrap_err();
        assert!(!err.permanent, "transport failures are transient: {err}");
    }
}
