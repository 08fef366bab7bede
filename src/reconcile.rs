//! Payment webhook reconciler.
//!
//! Per payment attempt:
//! `SESSION_CREATED → EVENT_RECEIVED → {VERIFIED, REJECTED} → {APPLIED, ALREADY_APPLIED}`
//!
//! Deliveries are at-least-once and may race each other. The provider
//! reference is the idempotency key: the ledger refuses a second order for it
//! at the storage layer, and the order insert and cart retirement commit
//! together or not at all.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::cart::CartService;
use crate::domain::aggregates::{Order, OrderLine};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::OrderId;
use crate::events::EventPublisher;
use crate::payment::{CompletedPayment, PaymentEvent, WebhookVerifier};
use crate::store::OrderLedger;
use crate::{EcommerceError, Result};

/// Outcome of a verified delivery. Every variant is acknowledged to the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Acknowledgement {
    Applied { order_id: OrderId, provider_reference: String, lines_removed: u64 },
    AlreadyApplied { order_id: OrderId, provider_reference: String },
    AwaitingPayment { provider_reference: String },
    Ignored { event_type: String },
    /// Authentic but unusable; retrying the same bytes would not help.
    Unprocessable { reason: String },
}

#[derive(Clone)]
pub struct WebhookReconciler {
    verifier: WebhookVerifier,
    ledger: Arc<dyn OrderLedger>,
    cart: CartService,
    publisher: Arc<dyn EventPublisher>,
    currency: String,
}

impl WebhookReconciler {
    pub fn new(verifier: WebhookVerifier, ledger: Arc<dyn OrderLedger>, cart: CartService, publisher: Arc<dyn EventPublisher>, currency: impl Into<String>) -> Self {
        Self { verifier, ledger, cart, publisher, currency: currency.into() }
    }

    /// `raw_payload` must be the request body exactly as received.
    pub async fn handle_event(&self, raw_payload: &[u8], signature_header: &str) -> Result<Acknowledgement> {
        if let Err(e) = self.verifier.verify(raw_payload, signature_header) {
            warn!(error = %e, bytes = raw_payload.len(), "rejecting webhook delivery");
            return Err(e);
        }

        let event = match PaymentEvent::parse(raw_payload) {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "verified webhook could not be interpreted");
                return Ok(Acknowledgement::Unprocessable { reason: e.to_string() });
            }
        };

        match event {
            PaymentEvent::Other { event_id, kind } => {
                info!(%event_id, event_type = %kind, "ignoring webhook event");
                Ok(Acknowledgement::Ignored { event_type: kind })
            }
            PaymentEvent::AwaitingPayment { event_id, provider_reference } => {
                info!(%event_id, %provider_reference, "checkout completed, payment not captured yet");
                Ok(Acknowledgement::AwaitingPayment { provider_reference })
            }
            PaymentEvent::Completed(payment) => self.apply(payment).await,
        }
    }

    #[instrument(skip(self, payment), fields(event_id = %payment.event_id, reference = %payment.provider_reference, owner = %payment.owner_id))]
    async fn apply(&self, payment: CompletedPayment) -> Result<Acknowledgement> {
        if let Some(existing) = self.ledger.find_by_reference(&payment.provider_reference).await? {
            info!(order_id = %existing.id, "payment already applied");
            return Ok(Acknowledgement::AlreadyApplied { order_id: existing.id, provider_reference: payment.provider_reference });
        }

        // With a charged amount the cart only supplies line detail, so failing
        // to price it must not block settlement of a captured payment.
        let (total, snapshot) = match payment.amount_total {
            Some(charged) => match self.cart.snapshot(payment.owner_id).await {
                Ok(snapshot) => {
                    if charged != snapshot.total {
                        warn!(%charged, cart_total = %snapshot.total, "cart changed after the session was created; recording the charged amount");
                    }
                    (charged, Some(snapshot))
                }
                Err(e) => {
                    warn!(error = %e, %charged, "could not price cart at settlement; recording the order without lines");
                    (charged, None)
                }
            },
            None => {
                let snapshot = self.cart.snapshot(payment.owner_id).await?;
                (snapshot.total, Some(snapshot))
            }
        };
        // Line detail is only kept when it accounts for exactly what was charged.
        let lines = match snapshot {
            Some(snapshot) if snapshot.total == total => snapshot.lines.iter().map(|l| OrderLine {
                product_id: l.product_id,
                name: l.name.clone(),
                unit_price: l.unit_price.unwrap_or(l.line_total),
                quantity: l.quantity,
            }).collect(),
            _ => vec![],
        };
        let currency = payment.currency.clone().unwrap_or_else(|| self.currency.clone());
        let mut order = Order::paid(payment.owner_id, total, &currency, payment.provider_reference.clone(), lines);

        match self.ledger.record_order(&order).await {
            Ok(lines_removed) => {
                info!(order_id = %order.id, %total, lines_removed, "order recorded and cart retired");
                let mut events = order.take_events();
                events.push(DomainEvent::CartRetired { owner_id: order.owner_id, lines_removed });
                for event in &events {
                    if let Err(e) = self.publisher.publish(event).await {
                        warn!(error = %e, subject = event.subject(), "failed to publish domain event");
                    }
                }
                Ok(Acknowledgement::Applied { order_id: order.id, provider_reference: payment.provider_reference, lines_removed })
            }
            Err(EcommerceError::StorageConflict(reason)) => {
                // A concurrent delivery of the same payment won the insert.
                let existing = self.ledger.find_by_reference(&payment.provider_reference).await?
                    .ok_or_else(|| EcommerceError::StorageConflict(reason))?;
                info!(order_id = %existing.id, "payment applied by a concurrent delivery");
                Ok(Acknowledgement::AlreadyApplied { order_id: existing.id, provider_reference: payment.provider_reference })
            }
            Err(e) => Err(e),
        }
    }
}
