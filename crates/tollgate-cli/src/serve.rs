// SPDX-License-Identifier: BUSL-1.1
//! `tollgate serve` — assemble and run the workflow API server.
//!
//! Wiring order matters: audit log first (shared by gate and engine), then
//! the descriptor issuer and rail, then the verifier over both, then the
//! engine, then the Axum app. Auth tokens come from the environment
//! (`TOLLGATE_AUTH_TOKEN`, `TOLLGATE_ADMIN_TOKEN`) so they never appear in
//! process listings.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::Args;

use tollgate_api::state::{ApiConfig, AppState};
use tollgate_core::{ActionParty, ActionType};
use tollgate_engine::{ActionEngine, ActionFinalizer, ActionRecord, FinalizeError};
use tollgate_payment::{
    DescriptorIssuer, FacilitatorConfig, HttpFacilitatorRail, MockPaymentRail, PaymentRail,
    PaymentVerifier,
};
use tollgate_policy::{AuditLog, PolicyRule, RulePolicyGate};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to bind on.
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Base URL of the payment facilitator. When absent, a local mock rail
    /// that settles every payment is used (development only).
    #[arg(long)]
    pub facilitator_url: Option<String>,

    /// JSON file containing the policy rule set. When absent, the gate
    /// allows everything.
    #[arg(long)]
    pub policy_file: Option<PathBuf>,

    /// Party id that receives gated payments.
    #[arg(long, default_value = "tollgate-operator")]
    pub receiver: String,
}

/// Finalizer for the reference deployment: records the settlement in the
/// log and returns a receipt payload. Real deployments register their own
/// side-effect capability per action type.
struct ReceiptFinalizer;

#[async_trait]
impl ActionFinalizer for ReceiptFinalizer {
    async fn finalize(&self, record: &ActionRecord) -> Result<serde_json::Value, FinalizeError> {
        tracing::info!(
            action_id = %record.action_id,
            action_type = %record.action_type,
            "finalizing action"
        );
        Ok(serde_json::json!({
            "settled_action": record.action_id.as_str(),
            "action_type": record.action_type.to_string(),
        }))
    }
}

pub async fn run_serve(args: &ServeArgs) -> anyhow::Result<()> {
    let audit = Arc::new(AuditLog::new());

    let rules = load_rules(args.policy_file.as_deref())?;
    let gate = match rules {
        Some(rules) => {
            tracing::info!(rules = rules.len(), "policy gate loaded from file");
            Arc::new(RulePolicyGate::new(rules, audit.clone()))
        }
        None => {
            tracing::warn!("no policy file given; gate allows all actions");
            Arc::new(RulePolicyGate::allow_all(audit.clone()))
        }
    };

    let rail: Arc<dyn PaymentRail> = match &args.facilitator_url {
        Some(url) => {
            tracing::info!(facilitator = %url, "using HTTP facilitator rail");
            Arc::new(HttpFacilitatorRail::new(FacilitatorConfig::new(url.clone()))?)
        }
        None => {
            tracing::warn!("no facilitator configured; using mock rail (development only)");
            Arc::new(MockPaymentRail::new())
        }
    };

    let facilitator_url = args
        .facilitator_url
        .clone()
        .unwrap_or_else(|| format!("http://127.0.0.1:{}/mock-facilitator", args.port));
    let issuer = Arc::new(DescriptorIssuer::new(facilitator_url));
    let verifier = Arc::new(PaymentVerifier::new(issuer.clone(), rail));

    let engine = ActionEngine::new(
        gate,
        issuer,
        verifier,
        audit,
        ActionParty::new(&args.receiver),
    )
    .register_finalizer(ActionType::Settlement, Arc::new(ReceiptFinalizer))
    .register_finalizer(ActionType::Notarization, Arc::new(ReceiptFinalizer));

    let config = ApiConfig {
        auth_token: std::env::var("TOLLGATE_AUTH_TOKEN").ok(),
        admin_token: std::env::var("TOLLGATE_ADMIN_TOKEN").ok(),
    };
    if config.auth_token.is_none() {
        tracing::warn!("TOLLGATE_AUTH_TOKEN not set; API runs unauthenticated");
    }

    let app = tollgate_api::app(AppState::new(Arc::new(engine), config));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], args.port));
    tracing::info!("tollgate API listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn load_rules(path: Option<&std::path::Path>) -> anyhow::Result<Option<Vec<PolicyRule>>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read policy file {}", path.display()))?;
    let rules: Vec<PolicyRule> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid policy file {}", path.display()))?;
    Ok(Some(rules))
}
