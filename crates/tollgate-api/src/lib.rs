// SPDX-License-Identifier: BUSL-1.1
//! # tollgate-api — Axum HTTP Surface
//!
//! The HTTP layer over the action engine, built on Axum/Tower/Tokio.
//!
//! ## API Surface
//!
//! | Route                            | Module              | Purpose          |
//! |----------------------------------|---------------------|------------------|
//! | `POST /v1/actions/:id/execute`   | [`routes::actions`] | Start / resume   |
//! | `POST /v1/actions/:id/pay`       | [`routes::actions`] | Submit payment   |
//! | `GET /v1/actions/:id`            | [`routes::actions`] | Inspect record   |
//! | `GET /openapi.json`              | [`openapi`]         | OpenAPI spec     |
//! | `GET /health/*`                  | `lib.rs`            | Probes (no auth) |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → Handler
//! ```
//!
//! The 402 handshake is part of the route contract, not middleware: the
//! execute handler returns `402 Payment Required` with the descriptor body
//! when payment is outstanding.

pub mod auth;
pub mod error;
pub mod extractors;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

pub use error::AppError;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) are mounted outside the auth middleware so
/// they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
        admin_token: state.config.admin_token.clone(),
    };

    // Authenticated API routes. Body size limit 1 MiB; action payloads and
    // payment instruments are small.
    let api = Router::new()
        .merge(routes::actions::router())
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    let unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// GET /health/liveness — process is up.
async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// GET /health/readiness — the engine is constructed and serving.
async fn readiness() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ready" })))
}
