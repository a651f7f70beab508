// SPDX-License-Identifier: BUSL-1.1
//! # OpenAPI Specification Assembly
//!
//! Assembles the utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the Bearer token security scheme to the OpenAPI spec.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Bearer token authentication. Set via TOLLGATE_AUTH_TOKEN / \
                             TOLLGATE_ADMIN_TOKEN env vars.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Assembled OpenAPI spec for the action workflow API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tollgate API — Payment-Gated Action Workflow",
        version = "0.1.0",
        description = "Executes sensitive actions behind a compliance policy gate and an \
x402-style payment handshake.\n\n- `POST /v1/actions/{id}/execute` starts or resumes an \
action; 402 responses carry the payment descriptor\n- `POST /v1/actions/{id}/pay` submits \
a payment payload\n- `GET /v1/actions/{id}` inspects the action record\n\nThe `action_id` \
is the idempotency key: retries with the same id never re-evaluate policy or re-charge.\n\n\
Authentication: Bearer token via `Authorization: Bearer <token>`. Health probes \
(`/health/*`) are unauthenticated.",
        license(name = "BUSL-1.1")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        crate::routes::actions::execute_action,
        crate::routes::actions::submit_payment,
        crate::routes::actions::get_action,
    ),
    components(schemas(
        crate::routes::actions::ExecuteActionRequest,
        crate::routes::actions::ActionTypeInput,
        crate::routes::actions::AmountInput,
        crate::routes::actions::PartyInput,
        crate::routes::actions::PaymentSubmission,
        crate::routes::actions::PaymentRequiredResponse,
        crate::routes::actions::DescriptorOutput,
        crate::routes::actions::ActionResponse,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "actions", description = "Payment-gated action workflow"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Router serving the generated spec.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(serve_openapi))
}

async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
