// SPDX-License-Identifier: BUSL-1.1
//! # Finalizer Capability
//!
//! The action-specific side effect (settle the trade, write the
//! notarization record) is injected into the engine as a capability, so
//! both use sites share one tested state machine instead of two divergent
//! copies. The engine invokes a finalizer exactly once per action.

use async_trait::async_trait;
use thiserror::Error;

use crate::record::ActionRecord;

/// The final side effect failed.
///
/// When this happens after payment was taken it is the most sensitive
/// failure in the system; the engine surfaces it distinctly and flags the
/// record for manual reconciliation.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct FinalizeError(pub String);

impl FinalizeError {
    /// Construct from any displayable cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Executes the action's side effect and returns its result payload
/// (e.g. final trade id, notarization hash).
///
/// Implementations are `Send + Sync` and registered per
/// [`ActionType`](tollgate_core::ActionType). The engine guarantees:
/// the record has passed policy, payment is resolved, and no finalizer
/// has run for this action before.
#[async_trait]
pub trait ActionFinalizer: Send + Sync {
    /// Perform the side effect exactly once.
    async fn finalize(&self, record: &ActionRecord) -> Result<serde_json::Value, FinalizeError>;
}
