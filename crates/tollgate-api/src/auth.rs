// SPDX-License-Identifier: BUSL-1.1
//! # Authentication Middleware
//!
//! Static bearer token authentication. Two tokens are recognized: the
//! operator token and the admin token (which additionally authorizes the
//! payment bypass). The resolved identity is injected into request
//! extensions for handlers to build a [`CallerContext`](tollgate_core::CallerContext).
//!
//! Health probes are mounted outside this middleware and stay
//! unauthenticated.

use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use axum::Extension;

use tollgate_core::Role;

use crate::error::AppError;

/// Token configuration injected as an extension.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub token: Option<String>,
    pub admin_token: Option<String>,
}

/// Caller identity resolved by authentication.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub actor_id: String,
    pub role: Role,
}

/// Optional actor identifier header; falls back to the role name.
const ACTOR_HEADER: &str = "x-actor-id";

/// Axum middleware enforcing bearer authentication.
pub async fn auth_middleware(
    Extension(config): Extension<AuthConfig>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = resolve_identity(&config, &request)?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

fn resolve_identity(config: &AuthConfig, request: &Request) -> Result<CallerIdentity, AppError> {
    let actor = |fallback: &str| {
        request
            .headers()
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(fallback)
            .to_string()
    };

    // No token configured: open instance, every caller is an operator.
    if config.token.is_none() && config.admin_token.is_none() {
        return Ok(CallerIdentity {
            actor_id: actor("anonymous"),
            role: Role::Operator,
        });
    }

    let bearer = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

    if config.admin_token.as_deref() == Some(bearer) {
        return Ok(CallerIdentity {
            actor_id: actor("admin"),
            role: Role::Admin,
        });
    }
    if config.token.as_deref() == Some(bearer) {
        return Ok(CallerIdentity {
            actor_id: actor("operator"),
            role: Role::Operator,
        });
    }
    Err(AppError::Unauthorized("invalid bearer token".to_string()))
}
