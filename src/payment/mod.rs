//! Hosted payment provider integration.
//!
//! - `PaymentProvider` creates hosted checkout sessions
//! - `signature` authenticates inbound webhook deliveries
//! - `event` turns a verified payload into a `PaymentEvent`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::Money;
use crate::Result;

pub mod event;
pub mod signature;
pub mod stripe;

pub use event::{CompletedPayment, PaymentEvent};
pub use signature::WebhookVerifier;
pub use stripe::StripeClient;

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a hosted checkout session. Any transport or provider failure is
    /// reported as `PaymentProviderUnavailable`.
    async fn create_checkout_session(&self, request: &SessionRequest) -> Result<ProviderSession>;
}

/// One line as the provider will show and charge it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLineItem {
    pub name: String,
    pub unit_amount: Money,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub line_items: Vec<SessionLineItem>,
    pub total: Money,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Echoed back on the completion event so the payment can be tied to its owner.
    pub client_reference: String,
    /// Sent as the provider's idempotency key.
    pub idempotency_key: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSession {
    pub id: String,
    pub redirect_url: String,
}
