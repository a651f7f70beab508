// SPDX-License-Identifier: BUSL-1.1
//! # Append-Only Audit Trail
//!
//! Every policy evaluation, payment event, and admin bypass appends a record
//! here. The log is append-only by construction: the only mutating operation
//! is [`AuditLog::append`], and records are returned by value.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub record_id: Uuid,
    /// The action this record concerns.
    pub action_id: String,
    /// Event kind string (e.g. "policy.evaluated", "payment.skipped_admin").
    pub event: String,
    /// Event-specific detail.
    pub detail: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

/// In-memory append-only audit log.
///
/// Thread-safe; shared across the gate, the payment layer, and the engine
/// via `Arc`.
#[derive(Debug, Default)]
pub struct AuditLog {
    records: RwLock<Vec<AuditRecord>>,
}

impl AuditLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return it.
    pub fn append(
        &self,
        action_id: impl Into<String>,
        event: impl Into<String>,
        detail: serde_json::Value,
    ) -> AuditRecord {
        let record = AuditRecord {
            record_id: Uuid::new_v4(),
            action_id: action_id.into(),
            event: event.into(),
            detail,
            recorded_at: Utc::now(),
        };
        tracing::debug!(
            action_id = %record.action_id,
            event = %record.event,
            "audit record appended"
        );
        self.records.write().push(record.clone());
        record
    }

    /// Snapshot of all records, in append order.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.read().clone()
    }

    /// Snapshot of records for one action, in append order.
    pub fn for_action(&self, action_id: &str) -> Vec<AuditRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.action_id == action_id)
            .cloned()
            .collect()
    }

    /// Number of records in the log.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// True when the log holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
