// SPDX-License-Identifier: BUSL-1.1
//! Payment signing capability.
//!
//! Producing the rail-specific payment instrument (signing a transfer,
//! authorizing a wallet debit) is deployment-specific and injected into
//! the orchestrator as a trait object.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::types::Descriptor;

/// The signer could not produce an instrument for the descriptor.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct SignerError(pub String);

impl SignerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Produces the opaque payment instrument for an outstanding descriptor.
#[async_trait]
pub trait PaymentSigner: Send + Sync {
    /// Sign a payment matching `descriptor`, returning the instrument the
    /// facilitator settles.
    async fn sign_payment(&self, descriptor: &Descriptor) -> Result<Value, SignerError>;
}

/// Signer that returns a fixed instrument. For tests and local rails that
/// accept unauthenticated transfers.
#[derive(Debug, Clone)]
pub struct StaticInstrumentSigner {
    instrument: Value,
}

impl StaticInstrumentSigner {
    pub fn new(instrument: Value) -> Self {
        Self { instrument }
    }
}

#[async_trait]
impl PaymentSigner for StaticInstrumentSigner {
    async fn sign_payment(&self, _descriptor: &Descriptor) -> Result<Value, SignerError> {
        Ok(self.instrument.clone())
    }
}
