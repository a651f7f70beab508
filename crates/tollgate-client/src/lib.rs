// SPDX-License-Identifier: BUSL-1.1
//! # Workflow Client
//!
//! Typed client for the payment-gated action workflow API. Wraps the full
//! execute → 402 → pay handshake behind [`WorkflowClient::run_action`],
//! with exponential-backoff retry on transient failures and a pluggable
//! [`PaymentSigner`] for producing rail-specific payment instruments.
//!
//! The client treats the `action_id` as the caller-owned idempotency key:
//! every retry reuses it, so a request that timed out after the server
//! acted is resolved by the server's duplicate detection, not by a second
//! charge.

pub mod error;
pub mod signer;
pub mod types;
pub mod workflow;

pub use error::ClientError;
pub use signer::{PaymentSigner, SignerError, StaticInstrumentSigner};
pub use types::{ActionView, Descriptor, ExecuteRequest, PaymentRequest, PaymentRequired};
pub use workflow::{ClientConfig, WorkflowClient};
