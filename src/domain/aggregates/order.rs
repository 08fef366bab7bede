//! Order Aggregate
//!
//! Orders are only ever created from a verified payment confirmation, so the
//! single reachable status is `Paid`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{Money, OrderId, OwnerId, ProductId, Quantity};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner_id: OwnerId,
    pub total: Money,
    pub currency: String,
    /// Payment session id at the provider; unique across all orders.
    pub provider_reference: String,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine { pub product_id: ProductId, pub name: String, pub unit_price: Money, pub quantity: Quantity }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus { #[default] Paid }

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str { match self { Self::Paid => "PAID" } }
    pub fn parse(s: &str) -> Result<Self, OrderError> {
        match s { "PAID" => Ok(Self::Paid), other => Err(OrderError::UnknownStatus(other.to_string())) }
    }
}

impl Order {
    pub fn paid(owner_id: OwnerId, total: Money, currency: &str, provider_reference: impl Into<String>, lines: Vec<OrderLine>) -> Self {
        let mut order = Self {
            id: OrderId::new(), owner_id, total, currency: currency.to_string(),
            provider_reference: provider_reference.into(), status: OrderStatus::Paid, lines,
            created_at: Utc::now(), events: vec![],
        };
        order.raise_event(DomainEvent::OrderPaid {
            order_id: order.id, owner_id, total, provider_reference: order.provider_reference.clone(),
        });
        order
    }

    /// Rebuild a stored order; raises no events.
    pub fn restore(id: OrderId, owner_id: OwnerId, total: Money, currency: String, provider_reference: String, status: OrderStatus, lines: Vec<OrderLine>, created_at: DateTime<Utc>) -> Self {
        Self { id, owner_id, total, currency, provider_reference, status, lines, created_at, events: vec![] }
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError { UnknownStatus(String) }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::UnknownStatus(s) => write!(f, "Unknown order status {s}") }
    }
}
