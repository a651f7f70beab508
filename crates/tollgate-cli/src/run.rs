// SPDX-License-Identifier: BUSL-1.1
//! `tollgate run` — drive one action against a running server.
//!
//! Resolves the full execute → 402 → pay handshake using the workflow
//! client and prints the final record. The action id is generated once up
//! front; every retry inside the client reuses it.

use anyhow::{bail, Context};
use clap::Args;

use tollgate_client::{ClientConfig, ExecuteRequest, StaticInstrumentSigner, WorkflowClient};
use tollgate_core::{ActionParty, ActionType, MoneyAmount};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Base URL of the workflow API.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    pub server: String,

    /// Bearer token. Falls back to `TOLLGATE_AUTH_TOKEN`.
    #[arg(long)]
    pub token: Option<String>,

    /// Actor id recorded in the audit trail.
    #[arg(long)]
    pub actor: Option<String>,

    /// Action id to execute. Generated when absent; pass the same id to
    /// resume an earlier attempt.
    #[arg(long)]
    pub action_id: Option<String>,

    /// Action type: `settlement` or `notarization`.
    #[arg(long, default_value = "settlement")]
    pub action_type: String,

    /// Amount currency code.
    #[arg(long, default_value = "USD")]
    pub currency: String,

    /// Amount value, e.g. `50.00`.
    #[arg(long)]
    pub value: String,

    /// Primary party id.
    #[arg(long)]
    pub party: String,

    /// Counterparty id.
    #[arg(long)]
    pub counterparty: Option<String>,

    /// Free-form reference string.
    #[arg(long)]
    pub reference: Option<String>,

    /// Request the admin payment bypass (requires an admin token).
    #[arg(long)]
    pub skip_payment: bool,

    /// Payment instrument as a JSON value, passed to the facilitator as-is.
    #[arg(long, default_value = "{\"scheme\":\"mock\"}")]
    pub instrument: String,
}

pub async fn run_run(args: &RunArgs) -> anyhow::Result<()> {
    let action_type = parse_action_type(&args.action_type)?;
    let instrument: serde_json::Value =
        serde_json::from_str(&args.instrument).context("--instrument is not valid JSON")?;

    let action_id = args
        .action_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut config = ClientConfig::new(args.server.clone());
    config.auth_token = args
        .token
        .clone()
        .or_else(|| std::env::var("TOLLGATE_AUTH_TOKEN").ok());
    config.actor_id = args.actor.clone();
    let client = WorkflowClient::new(config)?;

    let mut request = ExecuteRequest::new(
        action_type,
        MoneyAmount::new(&args.currency, &args.value),
        ActionParty::new(&args.party),
    );
    request.counterparty = args.counterparty.clone().map(ActionParty::new);
    request.reference = args.reference.clone();
    request.skip_payment = args.skip_payment;

    tracing::info!(action_id, "driving action to completion");
    let signer = StaticInstrumentSigner::new(instrument);
    let view = client.run_action(&action_id, &request, &signer).await?;

    let summary = serde_json::json!({
        "action_id": view.action_id,
        "state": view.state,
        "payment_status": view.payment_status,
        "requires_review": view.requires_review,
        "transaction_hash": view.transaction_hash,
        "result": view.result,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn parse_action_type(raw: &str) -> anyhow::Result<ActionType> {
    match raw {
        "settlement" => Ok(ActionType::Settlement),
        "notarization" => Ok(ActionType::Notarization),
        other => bail!("unknown action type {other:?} (expected settlement or notarization)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_type_parses_known_names() {
        assert_eq!(
            parse_action_type("settlement").unwrap(),
            ActionType::Settlement
        );
        assert_eq!(
            parse_action_type("notarization").unwrap(),
            ActionType::Notarization
        );
        assert!(parse_action_type("transfer").is_err());
    }
}
