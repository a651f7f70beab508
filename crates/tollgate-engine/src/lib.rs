// SPDX-License-Identifier: BUSL-1.1
//! # tollgate-engine — Action State Machine
//!
//! The orchestrator of the payment-gated workflow. Drives an action through
//! policy evaluation, the payment handshake, and finalization; persists one
//! record per `action_id` so retries are safe.
//!
//! ## State machine
//!
//! ```text
//! Initiated → PolicyEvaluating → {Blocked | PolicyPassed}
//!                                           │
//!                      ┌────────────────────┴──────────────┐
//!              AwaitingPayment → Paid              SkippedPayment
//!                                  └───────┬──────────────┘
//!                                      Completed
//! ```
//!
//! `Failed` is reachable from any non-terminal state on unrecoverable error.
//! `Blocked`, `Completed`, and `Failed` are terminal; terminal records are
//! never mutated again.
//!
//! ## Single-flight
//!
//! Operations on one `action_id` are serialized behind a per-key lock;
//! concurrent duplicates attach to the existing execution and observe its
//! progression instead of triggering a second evaluation or charge.
//! Operations on distinct keys run fully in parallel.

pub mod engine;
pub mod finalizer;
pub mod record;
pub mod state;

pub use engine::{ActionEngine, ActionOutcome, EngineConfig};
pub use finalizer::{ActionFinalizer, FinalizeError};
pub use record::{ActionRecord, PaymentStatus};
pub use state::ActionState;
