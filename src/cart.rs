//! Cart service: per-owner line management joined with live catalog data.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::catalog::CatalogReader;
use crate::domain::aggregates::{CartLine, Product};
use crate::domain::value_objects::{CartLineId, Money, OwnerId, ProductId, QuantityChange};
use crate::pricing::{CheckoutSnapshot, PricedLine};
use crate::store::CartStore;
use crate::{EcommerceError, Result};

/// A stored line together with the product it points at.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartEntry {
    pub line: CartLine,
    pub product: Product,
}

/// What the cart page shows: priced lines and the authoritative total.
#[derive(Clone, Debug, Serialize)]
pub struct CartView {
    pub lines: Vec<PricedLine>,
    pub total: Money,
    pub item_count: u64,
}

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn CartStore>,
    catalog: Arc<dyn CatalogReader>,
}

impl CartService {
    pub fn new(store: Arc<dyn CartStore>, catalog: Arc<dyn CatalogReader>) -> Self { Self { store, catalog } }

    #[instrument(skip(self))]
    pub async fn add_item(&self, owner: OwnerId, product_id: ProductId) -> Result<CartLine> {
        if self.catalog.get_product(product_id).await?.is_none() {
            return Err(EcommerceError::ProductNotFound);
        }
        let line = self.store.add_item(owner, product_id).await?;
        info!(line_id = %line.id, quantity = %line.quantity, "cart line added");
        Ok(line)
    }

    /// `Ok(None)` when a decrement removed the line.
    #[instrument(skip(self))]
    pub async fn change_quantity(&self, owner: OwnerId, line_id: CartLineId, change: QuantityChange) -> Result<Option<CartLine>> {
        let line = self.store.change_quantity(owner, line_id, change).await?;
        match &line {
            Some(l) => info!(quantity = %l.quantity, "cart line updated"),
            None => info!("cart line removed on decrement"),
        }
        Ok(line)
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, owner: OwnerId, line_id: CartLineId) -> Result<()> {
        if self.store.remove_item(owner, line_id).await? {
            info!("cart line removed");
        }
        Ok(())
    }

    /// Lines joined with current product data.
    ///
    /// A line whose product has disappeared from the catalog is dropped from
    /// the cart and skipped; the rest of the cart is returned.
    #[instrument(skip(self))]
    pub async fn list_items(&self, owner: OwnerId) -> Result<Vec<CartEntry>> {
        let lines = self.store.lines(owner).await?;
        let mut entries = Vec::with_capacity(lines.len());
        let mut orphaned = Vec::new();
        for line in lines {
            match self.catalog.get_product(line.product_id).await? {
                Some(product) => entries.push(CartEntry { line, product }),
                None => {
                    warn!(line_id = %line.id, product_id = %line.product_id, "dropping cart line for missing product");
                    orphaned.push(line.id);
                }
            }
        }
        if !orphaned.is_empty() {
            self.store.drop_lines(owner, &orphaned).await?;
        }
        Ok(entries)
    }

    pub async fn view(&self, owner: OwnerId) -> Result<CartView> {
        let snapshot = self.snapshot(owner).await?;
        let item_count = snapshot.lines.iter().map(|l| u64::from(l.quantity.value())).sum();
        Ok(CartView { lines: snapshot.lines, total: snapshot.total, item_count })
    }

    /// Priced snapshot of the owner's cart as it stands now.
    pub async fn snapshot(&self, owner: OwnerId) -> Result<CheckoutSnapshot> {
        let entries = self.list_items(owner).await?;
        CheckoutSnapshot::price(owner, &entries)
    }
}
