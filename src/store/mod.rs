//! Persistence seams for cart lines and the order ledger.
//!
//! Both tables are the only shared mutable state of the service. Cart
//! mutations are serialized per owner by the store; order recording is
//! guarded by a storage-level uniqueness constraint on the provider
//! reference and clears the owner's cart in the same transaction.

use async_trait::async_trait;

use crate::domain::aggregates::{CartLine, Order};
use crate::domain::value_objects::{CartLineId, OwnerId, ProductId, QuantityChange};
use crate::Result;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Add one of `product_id`, creating the line with quantity 1 on first add.
    async fn add_item(&self, owner: OwnerId, product_id: ProductId) -> Result<CartLine>;

    /// Step a line's quantity. `Ok(None)` means the line reached zero and was deleted.
    ///
    /// Fails with `Forbidden` when the line belongs to another owner and with
    /// `CartLineNotFound` when it does not exist.
    async fn change_quantity(&self, owner: OwnerId, line_id: CartLineId, change: QuantityChange) -> Result<Option<CartLine>>;

    /// Delete a line. Returns whether anything was deleted.
    async fn remove_item(&self, owner: OwnerId, line_id: CartLineId) -> Result<bool>;

    /// Lines for `owner`, oldest first.
    async fn lines(&self, owner: OwnerId) -> Result<Vec<CartLine>>;

    /// Delete specific lines of `owner`, e.g. ones whose product is gone.
    async fn drop_lines(&self, owner: OwnerId, line_ids: &[CartLineId]) -> Result<u64>;
}

#[async_trait]
pub trait OrderLedger: Send + Sync {
    async fn find_by_reference(&self, provider_reference: &str) -> Result<Option<Order>>;

    /// Insert `order` and retire its owner's cart as one atomic unit.
    ///
    /// Returns the number of cart lines removed. A second order with the same
    /// provider reference fails with `StorageConflict` and changes nothing.
    async fn record_order(&self, order: &Order) -> Result<u64>;

    /// Order history for `owner`, newest first.
    async fn list_orders(&self, owner: OwnerId) -> Result<Vec<Order>>;
}
