//! Domain events
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{Money, OrderId, OwnerId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderPaid { order_id: OrderId, owner_id: OwnerId, total: Money, provider_reference: String },
    CartRetired { owner_id: OwnerId, lines_removed: u64 },
}

impl DomainEvent {
    pub const fn subject(&self) -> &'static str {
        match self {
            Self::OrderPaid { .. } => "ecommerce.order.paid",
            Self::CartRetired { .. } => "ecommerce.cart.retired",
        }
    }
}
