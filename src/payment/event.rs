//! Provider event model.

use std::collections::HashMap;

use serde::Deserialize;

use crate::domain::value_objects::{Money, OwnerId};
use crate::{EcommerceError, Result};

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const ASYNC_PAYMENT_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";

#[derive(Debug, Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    id: String,
    client_reference_id: Option<String>,
    amount_total: Option<i64>,
    currency: Option<String>,
    payment_status: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// A payment that the provider reports as captured.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedPayment {
    pub event_id: String,
    pub provider_reference: String,
    pub owner_id: OwnerId,
    /// `None` when the provider did not echo the amount.
    pub amount_total: Option<Money>,
    pub currency: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentEvent {
    Completed(CompletedPayment),
    /// Checkout finished but funds are not captured yet; a later event settles it.
    AwaitingPayment { event_id: String, provider_reference: String },
    Other { event_id: String, kind: String },
}

impl PaymentEvent {
    /// Parse a payload whose signature has already been checked.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let envelope: Envelope = serde_json::from_slice(payload).map_err(|e| EcommerceError::InvalidEvent(e.to_string()))?;
        if !matches!(envelope.kind.as_str(), CHECKOUT_COMPLETED | ASYNC_PAYMENT_SUCCEEDED) {
            return Ok(Self::Other { event_id: envelope.id, kind: envelope.kind });
        }
        let session: CheckoutSessionObject = serde_json::from_value(envelope.data.object)
            .map_err(|e| EcommerceError::InvalidEvent(format!("checkout session object: {e}")))?;

        let paid = session.payment_status.as_deref().map_or(false, |s| s == "paid" || s == "no_payment_required");
        if envelope.kind == CHECKOUT_COMPLETED && !paid {
            return Ok(Self::AwaitingPayment { event_id: envelope.id, provider_reference: session.id });
        }

        let owner = session.client_reference_id.as_deref()
            .or_else(|| session.metadata.get("owner_id").map(String::as_str))
            .ok_or_else(|| EcommerceError::InvalidEvent(format!("session {} carries no owner reference", session.id)))?;
        let owner_id = owner.parse::<OwnerId>()
            .map_err(|e| EcommerceError::InvalidEvent(format!("session {} owner reference {owner:?}: {e}", session.id)))?;

        Ok(Self::Completed(CompletedPayment {
            event_id: envelope.id,
            provider_reference: session.id,
            owner_id,
            amount_total: session.amount_total.map(Money::from_minor),
            currency: session.currency,
        }))
    }
}
