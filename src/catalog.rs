//! Catalog reader: the read-only product lookup the cart and checkout depend on.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::aggregates::Product;
use crate::domain::value_objects::ProductId;
use crate::Result;

#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// `None` when the product does not exist (or no longer exists).
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    async fn list_products(&self, limit: i64, offset: i64) -> Result<Vec<Product>>;
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow { id: Uuid, name: String, price: Decimal, description: Option<String>, image: Option<String> }

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Product { id: ProductId::from_uuid(r.id), name: r.name, unit_price: r.price, description: r.description, image: r.image }
    }
}

#[derive(Clone)]
pub struct PgCatalog { db: PgPool }

impl PgCatalog {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl CatalogReader for PgCatalog {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT id, name, price, description, image FROM products WHERE id = $1")
            .bind(id).fetch_optional(&self.db).await?;
        Ok(row.map(Product::from))
    }

    async fn list_products(&self, limit: i64, offset: i64) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>("SELECT id, name, price, description, image FROM products ORDER BY created_at DESC, id LIMIT $1 OFFSET $2")
            .bind(limit).bind(offset).fetch_all(&self.db).await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }
}
