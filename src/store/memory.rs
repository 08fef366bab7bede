//! In-memory store for tests. One lock covers carts and orders, which makes
//! `record_order` atomic the same way the Postgres transaction is.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{CartStore, OrderLedger};
use crate::domain::aggregates::{Cart, CartLine, Order};
use crate::domain::value_objects::{CartLineId, OwnerId, ProductId, QuantityChange};
use crate::{EcommerceError, Result};

#[derive(Default)]
struct State {
    carts: HashMap<OwnerId, Cart>,
    orders: Vec<Order>,
}

impl State {
    fn cart_holding(&mut self, line_id: CartLineId) -> Option<&mut Cart> {
        self.carts.values_mut().find(|c| c.line(line_id).is_some())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    clears: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub async fn order_count(&self) -> usize { self.state.lock().await.orders.len() }

    /// How many times a non-empty cart was retired by `record_order`.
    pub fn clear_count(&self) -> u64 { self.clears.load(Ordering::SeqCst) }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn add_item(&self, owner: OwnerId, product_id: ProductId) -> Result<CartLine> {
        let mut state = self.state.lock().await;
        let cart = state.carts.entry(owner).or_insert_with(|| Cart::new(owner));
        Ok(cart.add_product(product_id).clone())
    }

    async fn change_quantity(&self, owner: OwnerId, line_id: CartLineId, change: QuantityChange) -> Result<Option<CartLine>> {
        let mut state = self.state.lock().await;
        let cart = state.cart_holding(line_id).ok_or(EcommerceError::CartLineNotFound)?;
        let next = cart.change_quantity(owner, line_id, change)?;
        Ok(next.and_then(|_| cart.line(line_id).cloned()))
    }

    async fn remove_item(&self, owner: OwnerId, line_id: CartLineId) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.cart_holding(line_id) {
            Some(cart) => Ok(cart.remove_line(owner, line_id)?),
            None => Ok(false),
        }
    }

    async fn lines(&self, owner: OwnerId) -> Result<Vec<CartLine>> {
        let state = self.state.lock().await;
        Ok(state.carts.get(&owner).map(|c| c.lines().to_vec()).unwrap_or_default())
    }

    async fn drop_lines(&self, owner: OwnerId, line_ids: &[CartLineId]) -> Result<u64> {
        let mut state = self.state.lock().await;
        let Some(cart) = state.carts.get_mut(&owner) else { return Ok(0) };
        let mut dropped = 0;
        for id in line_ids {
            if cart.remove_line(owner, *id)? { dropped += 1; }
        }
        Ok(dropped)
    }
}

#[async_trait]
impl OrderLedger for MemoryStore {
    async fn find_by_reference(&self, provider_reference: &str) -> Result<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().find(|o| o.provider_reference == provider_reference).cloned())
    }

    async fn record_order(&self, order: &Order) -> Result<u64> {
        let mut state = self.state.lock().await;
        if state.orders.iter().any(|o| o.provider_reference == order.provider_reference) {
            return Err(EcommerceError::StorageConflict(format!("provider_reference {} already recorded", order.provider_reference)));
        }
        state.orders.push(order.clone());
        let removed = state.carts.get_mut(&order.owner_id).map_or(0, Cart::clear) as u64;
        if removed > 0 { self.clears.fetch_add(1, Ordering::SeqCst); }
        Ok(removed)
    }

    async fn list_orders(&self, owner: OwnerId) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().rev().filter(|o| o.owner_id == owner).cloned().collect())
    }
}
