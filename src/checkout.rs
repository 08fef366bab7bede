//! Checkout orchestrator.
//!
//! Prices the owner's cart, asks the payment provider for a hosted session
//! and returns where to send the browser. Nothing is written locally: the
//! cart stays as it is and no order exists until the provider confirms the
//! payment through the webhook.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use crate::cart::CartService;
use crate::domain::value_objects::{Money, OwnerId};
use crate::payment::{PaymentProvider, SessionLineItem, SessionRequest};
use crate::pricing::{CheckoutSnapshot, PricedLine};
use crate::{EcommerceError, Result};

/// Where the provider sends the browser back to.
#[derive(Clone, Debug)]
pub struct RedirectUrls {
    pub success_url: String,
    pub cancel_url: String,
}

impl RedirectUrls {
    pub fn from_base(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            success_url: format!("{base}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{base}/checkout/cancel"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckoutRedirect {
    pub redirect_url: String,
    pub session_id: String,
    pub total: Money,
}

impl SessionLineItem {
    /// Lines with sub-cent unit prices are sent as one unit of the rounded
    /// line total, so the provider charges exactly the computed total.
    pub fn from_priced(line: &PricedLine) -> Self {
        match line.unit_price {
            Some(unit) => Self { name: line.name.clone(), unit_amount: unit, quantity: line.quantity.value() },
            None => Self { name: format!("{} × {}", line.name, line.quantity), unit_amount: line.line_total, quantity: 1 },
        }
    }
}

#[derive(Clone)]
pub struct CheckoutOrchestrator {
    cart: CartService,
    provider: Arc<dyn PaymentProvider>,
    redirects: RedirectUrls,
    currency: String,
}

impl CheckoutOrchestrator {
    pub fn new(cart: CartService, provider: Arc<dyn PaymentProvider>, redirects: RedirectUrls, currency: impl Into<String>) -> Self {
        Self { cart, provider, redirects, currency: currency.into() }
    }

    pub fn session_request(&self, snapshot: &CheckoutSnapshot) -> SessionRequest {
        SessionRequest {
            line_items: snapshot.lines.iter().map(SessionLineItem::from_priced).collect(),
            total: snapshot.total,
            currency: self.currency.clone(),
            success_url: self.redirects.success_url.clone(),
            cancel_url: self.redirects.cancel_url.clone(),
            client_reference: snapshot.owner_id.to_string(),
            idempotency_key: format!("checkout-{}", snapshot.fingerprint(&self.currency)),
        }
    }

    #[instrument(skip(self))]
    pub async fn begin_checkout(&self, owner: OwnerId) -> Result<CheckoutRedirect> {
        let snapshot = self.cart.snapshot(owner).await?;
        if snapshot.is_empty() {
            return Err(EcommerceError::EmptyCart);
        }
        let session = self.provider.create_checkout_session(&self.session_request(&snapshot)).await?;
        info!(session_id = %session.id, total = %snapshot.total, lines = snapshot.lines.len(), "checkout session created");
        Ok(CheckoutRedirect { redirect_url: session.redirect_url, session_id: session.id, total: snapshot.total })
    }
}
