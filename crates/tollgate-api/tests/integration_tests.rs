// SPDX-License-Identifier: BUSL-1.1
//! HTTP-level tests for the action workflow API: the 402 handshake, policy
//! blocks, payment submission, idempotent re-requests, and authentication.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use tollgate_api::state::{ApiConfig, AppState};
use tollgate_core::{ActionParty, ActionType, MoneyAmount};
use tollgate_engine::{ActionEngine, ActionFinalizer, ActionRecord, FinalizeError};
use tollgate_payment::{DescriptorIssuer, MockPaymentRail, PaymentVerifier};
use tollgate_policy::AuditLog;

// Rules shared by every test app: block above 1M USD, flag the watchlist.
mod rules_helper {
    use super::*;
    use tollgate_policy::{PolicyRule, RuleCondition, RuleEffect};

    pub fn standard() -> Vec<PolicyRule> {
        vec![
            PolicyRule {
                rule_id: "party-watchlist".to_string(),
                description: None,
                condition: RuleCondition::PartyDenied {
                    party_ids: vec!["party-watch".to_string()],
                },
                effect: RuleEffect::Flag,
            },
            PolicyRule {
                rule_id: "usd-amount-cap".to_string(),
                description: Some("block settlements above 1,000,000 USD".to_string()),
                condition: RuleCondition::AmountAbove {
                    threshold: MoneyAmount::new("USD", "1000000"),
                },
                effect: RuleEffect::Block,
            },
        ]
    }
}

struct SettlementFinalizer;

#[async_trait]
impl ActionFinalizer for SettlementFinalizer {
    async fn finalize(&self, record: &ActionRecord) -> Result<Value, FinalizeError> {
        Ok(json!({ "settled": record.action_id.as_str() }))
    }
}

fn test_app_with_auth(config: ApiConfig) -> Router {
    use tollgate_policy::RulePolicyGate;

    let audit = Arc::new(AuditLog::new());
    let gate = Arc::new(RulePolicyGate::new(rules_helper::standard(), audit.clone()));
    let issuer = Arc::new(DescriptorIssuer::new("https://facilitator.example/v1"));
    let verifier = Arc::new(PaymentVerifier::new(
        issuer.clone(),
        Arc::new(MockPaymentRail::new()),
    ));
    let engine = Arc::new(
        ActionEngine::new(
            gate,
            issuer,
            verifier,
            audit,
            ActionParty::new("tollgate-operator"),
        )
        .register_finalizer(ActionType::Settlement, Arc::new(SettlementFinalizer))
        .register_finalizer(ActionType::Notarization, Arc::new(SettlementFinalizer)),
    );

    tollgate_api::app(AppState::new(engine, config))
}

fn test_app() -> Router {
    test_app_with_auth(ApiConfig::default())
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

fn execute_body(value: &str) -> Value {
    json!({
        "action_type": "settlement",
        "amount": { "currency": "USD", "value": value },
        "party": { "party_id": "party-1", "name": null, "external_ref": null },
        "reference": "trade-42"
    })
}

fn pay_body(value: &str) -> Value {
    json!({
        "amount": { "currency": "USD", "value": value },
        "instrument": { "transfer": "signed-blob" }
    })
}

// ── The 402 handshake ───────────────────────────────────────────

#[tokio::test]
async fn execute_then_pay_completes_action() {
    let app = test_app();

    let resp = app
        .clone()
        .oneshot(post_json("/v1/actions/settle-1/execute", &execute_body("50000")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
    let body = body_json(resp).await;
    assert_eq!(body["state"], "awaiting_payment");
    assert_eq!(body["requires_review"], false);
    assert_eq!(body["payment"]["amount"]["value"], "50000");
    assert_eq!(body["payment"]["action_id"], "settle-1");
    assert!(body["payment"]["facilitator_url"]
        .as_str()
        .unwrap()
        .starts_with("https://"));

    let resp = app
        .clone()
        .oneshot(post_json("/v1/actions/settle-1/pay", &pay_body("50000")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["state"], "completed");
    assert_eq!(body["payment_status"], "paid");
    assert!(body["transaction_hash"].as_str().unwrap().starts_with("0x"));
    assert_eq!(body["result"]["settled"], "settle-1");

    // The record endpoint agrees.
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/v1/actions/settle-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["state"], "completed");
}

#[tokio::test]
async fn repeated_execute_returns_same_descriptor() {
    let app = test_app();

    let first = body_json(
        app.clone()
            .oneshot(post_json("/v1/actions/settle-2/execute", &execute_body("100")))
            .await
            .unwrap(),
    )
    .await;
    let second = body_json(
        app.oneshot(post_json("/v1/actions/settle-2/execute", &execute_body("100")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(first["payment"]["issued_at"], second["payment"]["issued_at"]);
    assert_eq!(first["payment"]["amount"], second["payment"]["amount"]);
}

#[tokio::test]
async fn execute_after_completion_returns_final_record() {
    let app = test_app();
    app.clone()
        .oneshot(post_json("/v1/actions/settle-3/execute", &execute_body("100")))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_json("/v1/actions/settle-3/pay", &pay_body("100")))
        .await
        .unwrap();

    let resp = app
        .oneshot(post_json("/v1/actions/settle-3/execute", &execute_body("100")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["state"], "completed");
}

// ── Policy outcomes ─────────────────────────────────────────────

#[tokio::test]
async fn blocked_action_returns_403_with_rule() {
    let app = test_app();

    let resp = app
        .clone()
        .oneshot(post_json("/v1/actions/settle-big/execute", &execute_body("2000000")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "POLICY_BLOCKED");
    assert_eq!(body["error"]["details"]["rule"], "usd-amount-cap");
    assert!(body["error"]["details"]["trace_id"].is_string());
    assert_eq!(body["error"]["retryable"], false);

    // Payment is unreachable for a blocked action.
    let resp = app
        .oneshot(post_json("/v1/actions/settle-big/pay", &pay_body("2000000")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn flagged_action_carries_review_marker() {
    let app = test_app();
    let mut body = execute_body("100");
    body["party"]["party_id"] = json!("party-watch");

    let resp = app
        .oneshot(post_json("/v1/actions/settle-flag/execute", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
    let body = body_json(resp).await;
    assert_eq!(body["requires_review"], true);
}

// ── Payment rejections ──────────────────────────────────────────

#[tokio::test]
async fn amount_mismatch_returns_422_and_action_stays_payable() {
    let app = test_app();
    app.clone()
        .oneshot(post_json("/v1/actions/settle-4/execute", &execute_body("100")))
        .await
        .unwrap();

    let resp = app
        .clone()
        .oneshot(post_json("/v1/actions/settle-4/pay", &pay_body("90")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "AMOUNT_MISMATCH");
    assert_eq!(body["error"]["details"]["got"], "90 USD");

    let resp = app
        .oneshot(post_json("/v1/actions/settle-4/pay", &pay_body("100")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn duplicate_payment_returns_409() {
    let app = test_app();
    app.clone()
        .oneshot(post_json("/v1/actions/settle-5/execute", &execute_body("100")))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_json("/v1/actions/settle-5/pay", &pay_body("100")))
        .await
        .unwrap();

    let resp = app
        .oneshot(post_json("/v1/actions/settle-5/pay", &pay_body("100")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "DUPLICATE_PAYMENT");
}

#[tokio::test]
async fn pay_for_unknown_action_returns_404() {
    let app = test_app();
    let resp = app
        .oneshot(post_json("/v1/actions/ghost/pay", &pay_body("100")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ── Payload validation ──────────────────────────────────────────

#[tokio::test]
async fn malformed_body_returns_422() {
    let app = test_app();
    let req = Request::builder()
        .method("POST")
        .uri("/v1/actions/settle-6/execute")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn zero_amount_returns_422() {
    let app = test_app();
    let resp = app
        .oneshot(post_json("/v1/actions/settle-7/execute", &execute_body("0")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn changed_payload_same_id_returns_422() {
    let app = test_app();
    app.clone()
        .oneshot(post_json("/v1/actions/settle-8/execute", &execute_body("100")))
        .await
        .unwrap();

    let resp = app
        .oneshot(post_json("/v1/actions/settle-8/execute", &execute_body("999")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(resp).await;
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("different payload"));
}

#[tokio::test]
async fn unknown_action_record_returns_404() {
    let app = test_app();
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/v1/actions/ghost")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ── Authentication & roles ──────────────────────────────────────

fn secured_config() -> ApiConfig {
    ApiConfig {
        auth_token: Some("op-secret".to_string()),
        admin_token: Some("admin-secret".to_string()),
    }
}

fn post_json_auth(uri: &str, body: &Value, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn missing_token_returns_401() {
    let app = test_app_with_auth(secured_config());
    let resp = app
        .oneshot(post_json("/v1/actions/settle-9/execute", &execute_body("100")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_probes_skip_authentication() {
    let app = test_app_with_auth(secured_config());
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/health/liveness")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_skip_bypasses_payment() {
    let app = test_app_with_auth(secured_config());
    let mut body = execute_body("100");
    body["skip_payment"] = json!(true);

    let resp = app
        .oneshot(post_json_auth(
            "/v1/actions/notarize-1/execute",
            &body,
            "admin-secret",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let parsed = body_json(resp).await;
    assert_eq!(parsed["state"], "completed");
    assert_eq!(parsed["payment_status"], "skipped_admin");
}

#[tokio::test]
async fn operator_skip_request_still_requires_payment() {
    let app = test_app_with_auth(secured_config());
    let mut body = execute_body("100");
    body["skip_payment"] = json!(true);

    let resp = app
        .oneshot(post_json_auth(
            "/v1/actions/settle-10/execute",
            &body,
            "op-secret",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
}

// ── OpenAPI ─────────────────────────────────────────────────────

#[tokio::test]
async fn openapi_spec_is_served() {
    let app = test_app();
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let spec = body_json(resp).await;
    assert!(spec["paths"]["/v1/actions/{action_id}/execute"].is_object());
}
