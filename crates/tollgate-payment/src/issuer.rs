// SPDX-License-Identifier: BUSL-1.1
//! # Payment Descriptor Issuer
//!
//! Mints payment descriptors and keeps them outstanding per `action_id`.
//! Issuance is idempotent: a second `issue` for the same action while its
//! payment is outstanding returns the original descriptor unchanged. The
//! `entry` API keeps the check-and-insert atomic.

use chrono::Utc;
use dashmap::DashMap;

use tollgate_core::{ActionId, ActionParty, MoneyAmount};

use crate::descriptor::PaymentDescriptor;

/// Issues and tracks outstanding payment descriptors.
#[derive(Debug, Default)]
pub struct DescriptorIssuer {
    /// Facilitator endpoint stamped into every descriptor.
    facilitator_url: String,
    outstanding: DashMap<ActionId, PaymentDescriptor>,
}

impl DescriptorIssuer {
    /// Create an issuer that points payers at `facilitator_url`.
    pub fn new(facilitator_url: impl Into<String>) -> Self {
        Self {
            facilitator_url: facilitator_url.into(),
            outstanding: DashMap::new(),
        }
    }

    /// Issue a descriptor for `action_id`, or return the outstanding one.
    pub fn issue(
        &self,
        action_id: &ActionId,
        amount: MoneyAmount,
        payer: ActionParty,
        receiver: ActionParty,
    ) -> PaymentDescriptor {
        self.outstanding
            .entry(action_id.clone())
            .or_insert_with(|| {
                tracing::info!(action_id = %action_id, amount = %amount, "payment descriptor issued");
                PaymentDescriptor {
                    action_id: action_id.clone(),
                    amount,
                    payer,
                    receiver,
                    facilitator_url: self.facilitator_url.clone(),
                    issued_at: Utc::now(),
                }
            })
            .clone()
    }

    /// The outstanding descriptor for `action_id`, if any.
    pub fn outstanding(&self, action_id: &ActionId) -> Option<PaymentDescriptor> {
        self.outstanding.get(action_id).map(|d| d.clone())
    }

    /// Drop the outstanding descriptor once its payment is resolved.
    pub fn settle(&self, action_id: &ActionId) {
        self.outstanding.remove(action_id);
    }
}
