// SPDX-License-Identifier: BUSL-1.1
//! # tollgate-policy — Compliance Policy Gate
//!
//! Evaluates a proposed action against compliance rules before it may touch
//! money. The gate produces a [`PolicyDecision`] (ALLOW / BLOCK / FLAG) with
//! an audit trace id, and every evaluation — including failed ones — lands
//! in the append-only [`AuditLog`]. That log is the compliance trail; it is
//! never skipped.
//!
//! ## Fail-closed contract
//!
//! When the underlying rule evaluator is unavailable the gate returns an
//! error, never an ALLOW. Callers treat that error as a retryable transient
//! failure, not a block.

pub mod audit;
pub mod decision;
pub mod gate;
pub mod rules;

pub use audit::{AuditLog, AuditRecord};
pub use decision::{Decision, PolicyDecision};
pub use gate::PolicyGate;
pub use rules::{PolicyRule, RuleCondition, RuleEffect, RulePolicyGate};
