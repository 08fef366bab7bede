//! Product view supplied by the catalog. Read-only from the cart's side.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::ProductId;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Catalog price in major units; may carry sub-cent precision.
    pub unit_price: Decimal,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>, unit_price: Decimal) -> Self {
        Self { id, name: name.into(), unit_price, description: None, image: None }
    }

    /// Convenience for prices already expressed in cents.
    pub fn with_minor_price(id: ProductId, name: impl Into<String>, minor: i64) -> Self {
        Self::new(id, name, Decimal::new(minor, 2))
    }
}
