//! Pricing engine.
//!
//! The one place that turns catalog prices and cart quantities into the
//! amount charged and the amount recorded. Arithmetic is done in
//! `Decimal` and each line is rounded half-up to whole cents before the
//! lines are summed, so totals never drift and never depend on line order.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::cart::CartEntry;
use crate::domain::value_objects::{CartLineId, Money, OwnerId, ProductId, Quantity};
use crate::{EcommerceError, Result};

const MINOR_UNITS: i64 = 100;

/// A cart line with its authoritative price attached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PricedLine {
    pub cart_line_id: CartLineId,
    pub product_id: ProductId,
    pub name: String,
    /// Unit price in cents, `None` when the catalog price has sub-cent precision.
    pub unit_price: Option<Money>,
    pub quantity: Quantity,
    pub line_total: Money,
}

/// Priced view of one owner's cart at the moment checkout begins. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckoutSnapshot {
    pub owner_id: OwnerId,
    pub lines: Vec<PricedLine>,
    pub total: Money,
}

/// `unit_price × quantity` in cents, rounded half-up.
pub fn line_total(unit_price: Decimal, quantity: Quantity) -> Result<Money> {
    if unit_price.is_sign_negative() {
        return Err(EcommerceError::InvalidPrice(format!("negative unit price {unit_price}")));
    }
    let exact = unit_price
        .checked_mul(Decimal::from(MINOR_UNITS))
        .and_then(|cents| cents.checked_mul(Decimal::from(quantity.value())))
        .ok_or_else(|| EcommerceError::InvalidPrice(format!("{unit_price} x {quantity} overflows")))?;
    exact
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .map(Money::from_minor)
        .ok_or_else(|| EcommerceError::InvalidPrice(format!("{unit_price} x {quantity} overflows")))
}

fn whole_cents(unit_price: Decimal) -> Option<Money> {
    let cents = unit_price.checked_mul(Decimal::from(MINOR_UNITS))?;
    if cents.fract().is_zero() { cents.to_i64().map(Money::from_minor) } else { None }
}

pub fn price_line(entry: &CartEntry) -> Result<PricedLine> {
    Ok(PricedLine {
        cart_line_id: entry.line.id,
        product_id: entry.product.id,
        name: entry.product.name.clone(),
        unit_price: whole_cents(entry.product.unit_price),
        quantity: entry.line.quantity,
        line_total: line_total(entry.product.unit_price, entry.line.quantity)?,
    })
}

/// Sum of already-rounded line totals.
pub fn compute_total(lines: &[PricedLine]) -> Result<Money> {
    lines.iter().try_fold(Money::ZERO, |acc, l| {
        acc.checked_add(l.line_total).ok_or_else(|| EcommerceError::InvalidPrice("cart total overflows".into()))
    })
}

impl CheckoutSnapshot {
    pub fn price(owner_id: OwnerId, entries: &[CartEntry]) -> Result<Self> {
        let lines = entries.iter().map(price_line).collect::<Result<Vec<_>>>()?;
        let total = compute_total(&lines)?;
        Ok(Self { owner_id, lines, total })
    }

    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    /// Stable digest of what is being bought and in which currency.
    ///
    /// Cart line ids are part of it: a cart retired by a settled payment and
    /// refilled with the same products digests differently.
    pub fn fingerprint(&self, currency: &str) -> String {
        let mut lines: Vec<_> = self.lines.iter().collect();
        lines.sort_by_key(|l| l.cart_line_id);
        let mut hasher = Sha256::new();
        hasher.update(self.owner_id.as_uuid().as_bytes());
        hasher.update(currency.as_bytes());
        for l in lines {
            hasher.update(l.cart_line_id.as_uuid().as_bytes());
            hasher.update(l.product_id.as_uuid().as_bytes());
            hasher.update((l.name.len() as u64).to_be_bytes());
            hasher.update(l.name.as_bytes());
            hasher.update(l.quantity.value().to_be_bytes());
            hasher.update(l.line_total.minor().to_be_bytes());
        }
        hex::encode(hasher.finalize())
    }
}
