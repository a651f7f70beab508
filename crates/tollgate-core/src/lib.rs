//! # tollgate-core — Foundational Types for the Tollgate Workflow
//!
//! Core type-system primitives shared by every crate in the workspace:
//! action identifiers, the action taxonomy, deterministic decimal money
//! amounts, caller identity, and the workflow error taxonomy.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `ActionId` is a validated
//!    newtype, never a bare string. The idempotency key is the backbone of
//!    single-flight execution and deserves a real type.
//!
//! 2. **Decimal-string money.** `MoneyAmount` carries its value as a decimal
//!    string and parses to integer minor units on demand. Floats never
//!    appear in a monetary code path.
//!
//! 3. **Typed outcomes over stringly errors.** `WorkflowError` is the single
//!    error taxonomy for the workflow; every variant knows whether it is
//!    retryable.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `tollgate-*` crates (leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - All public types derive `Debug`, `Clone`, `Serialize`/`Deserialize`.

pub mod action;
pub mod error;
pub mod money;

pub use action::{ActionId, ActionParty, ActionRequest, ActionType, CallerContext, Role};
pub use error::WorkflowError;
pub use money::MoneyAmount;
