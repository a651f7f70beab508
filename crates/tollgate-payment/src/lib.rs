// SPDX-License-Identifier: BUSL-1.1
//! # tollgate-payment — Payment Handshake
//!
//! The monetary half of the payment-gated workflow, modeled on the x402
//! "payment required" scheme: when an action needs payment, the issuer mints
//! a [`PaymentDescriptor`] (amount, payer, receiver, facilitator endpoint)
//! tied to the action's idempotency key; the client settles it out-of-band
//! and submits a [`PaymentPayload`]; the verifier checks the payload against
//! the outstanding descriptor, rejects replays, and asks the
//! [`PaymentRail`] to settle, yielding a [`PaymentProof`].
//!
//! ## Guarantees
//!
//! - Issuance is idempotent on `action_id`: re-requesting while the action
//!   awaits payment returns the same descriptor, never a second one.
//! - A proof is consumed at most once; replaying the same payload yields
//!   `DuplicatePayment`, never a second charge.

pub mod descriptor;
pub mod issuer;
pub mod rail;
pub mod verifier;

pub use descriptor::{PaymentDescriptor, PaymentPayload, PaymentProof};
pub use issuer::DescriptorIssuer;
pub use rail::{
    FacilitatorConfig, HttpFacilitatorRail, MockOutcome, MockPaymentRail, PaymentRail, RailError,
    RailReceipt,
};
pub use verifier::PaymentVerifier;
