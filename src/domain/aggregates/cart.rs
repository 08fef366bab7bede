//! Cart Aggregate
//!
//! A cart is the set of lines one owner holds. Two rules hold for every
//! stored state: each line has quantity >= 1, and an owner has at most one
//! line per product.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{CartLineId, OwnerId, ProductId, Quantity, QuantityChange};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub owner_id: OwnerId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub created_at: DateTime<Utc>,
}

/// What a quantity change does to a stored line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineTransition {
    Set(Quantity),
    Remove,
}

impl CartLine {
    pub fn new(owner_id: OwnerId, product_id: ProductId) -> Self {
        Self { id: CartLineId::new(), owner_id, product_id, quantity: Quantity::ONE, created_at: Utc::now() }
    }

    /// Decide the next state of this line for `owner` asking for `change`.
    pub fn transition(&self, owner: OwnerId, change: QuantityChange) -> Result<LineTransition, CartError> {
        if self.owner_id != owner { return Err(CartError::Forbidden); }
        Ok(match self.quantity.apply(change) {
            Some(q) => LineTransition::Set(q),
            None => LineTransition::Remove,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Cart {
    owner_id: OwnerId,
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new(owner_id: OwnerId) -> Self { Self { owner_id, lines: vec![] } }

    pub fn owner_id(&self) -> OwnerId { self.owner_id }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn line(&self, id: CartLineId) -> Option<&CartLine> { self.lines.iter().find(|l| l.id == id) }

    /// Add one more of `product_id`, creating the line on first add.
    pub fn add_product(&mut self, product_id: ProductId) -> &CartLine {
        let idx = match self.lines.iter().position(|l| l.product_id == product_id) {
            Some(i) => {
                let line = &mut self.lines[i];
                line.quantity = line.quantity.increment();
                i
            }
            None => {
                self.lines.push(CartLine::new(self.owner_id, product_id));
                self.lines.len() - 1
            }
        };
        &self.lines[idx]
    }

    /// Apply a single step change. Returns the new quantity, or `None` when the line was deleted.
    pub fn change_quantity(&mut self, actor: OwnerId, line_id: CartLineId, change: QuantityChange) -> Result<Option<Quantity>, CartError> {
        let idx = self.lines.iter().position(|l| l.id == line_id).ok_or(CartError::LineNotFound)?;
        match self.lines[idx].transition(actor, change)? {
            LineTransition::Set(q) => { self.lines[idx].quantity = q; Ok(Some(q)) }
            LineTransition::Remove => { self.lines.remove(idx); Ok(None) }
        }
    }

    /// Delete a line; absent lines are a no-op.
    pub fn remove_line(&mut self, actor: OwnerId, line_id: CartLineId) -> Result<bool, CartError> {
        match self.line(line_id) {
            None => Ok(false),
            Some(l) if l.owner_id != actor => Err(CartError::Forbidden),
            Some(_) => { self.lines.retain(|l| l.id != line_id); Ok(true) }
        }
    }

    pub fn clear(&mut self) -> usize { std::mem::take(&mut self.lines).len() }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { LineNotFound, Forbidden }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::LineNotFound => write!(f, "Cart line not found"), Self::Forbidden => write!(f, "Cart line belongs to another owner") }
    }
}
