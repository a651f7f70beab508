// SPDX-License-Identifier: BUSL-1.1
//! # Application State
//!
//! Shared state for the Axum application: the action engine and the API
//! configuration. Cheap to clone; all interior state is behind `Arc`.

use std::sync::Arc;

use tollgate_engine::ActionEngine;

/// API-level configuration.
#[derive(Debug, Clone, Default)]
pub struct ApiConfig {
    /// Bearer token for operator access. `None` disables authentication
    /// (local development only).
    pub auth_token: Option<String>,
    /// Bearer token granting the admin role (payment bypass).
    pub admin_token: Option<String>,
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ActionEngine>,
    pub config: ApiConfig,
}

impl AppState {
    /// Create application state over an engine.
    pub fn new(engine: Arc<ActionEngine>, config: ApiConfig) -> Self {
        Self { engine, config }
    }
}
