//! Postgres store.
//!
//! Cart lines are unique on `(owner_id, product_id)` and carry
//! `CHECK (quantity >= 1)`; orders are unique on `provider_reference`.
//! See `migrations/`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;
use uuid::Uuid;

use super::{CartStore, OrderLedger};
use crate::domain::aggregates::{CartLine, LineTransition, Order, OrderLine, OrderStatus};
use crate::domain::value_objects::{CartLineId, Money, OrderId, OwnerId, ProductId, Quantity, QuantityChange};
use crate::{EcommerceError, Result};

const CART_COLUMNS: &str = "id, owner_id, product_id, quantity, created_at";
const ORDER_COLUMNS: &str = "id, owner_id, total_minor, currency, provider_reference, status, created_at";

#[derive(Clone)]
pub struct PgStore { db: PgPool }

impl PgStore {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow { id: Uuid, owner_id: Uuid, product_id: Uuid, quantity: i32, created_at: DateTime<Utc> }

impl TryFrom<CartLineRow> for CartLine {
    type Error = EcommerceError;
    fn try_from(r: CartLineRow) -> Result<Self> {
        let quantity = Quantity::try_from(r.quantity)
            .map_err(|e| EcommerceError::StorageError(format!("cart line {} has invalid quantity {}: {e}", r.id, r.quantity)))?;
        Ok(CartLine {
            id: CartLineId::from_uuid(r.id), owner_id: OwnerId::from_uuid(r.owner_id),
            product_id: ProductId::from_uuid(r.product_id), quantity, created_at: r.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow { id: Uuid, owner_id: Uuid, total_minor: i64, currency: String, provider_reference: String, status: String, created_at: DateTime<Utc> }

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow { order_id: Uuid, product_id: Uuid, name: String, unit_price_minor: i64, quantity: i32 }

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> Result<Order> {
        let status = OrderStatus::parse(&self.status).map_err(|e| EcommerceError::StorageError(e.to_string()))?;
        Ok(Order::restore(
            OrderId::from_uuid(self.id), OwnerId::from_uuid(self.owner_id), Money::from_minor(self.total_minor),
            self.currency, self.provider_reference, status, lines, self.created_at,
        ))
    }
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = EcommerceError;
    fn try_from(r: OrderLineRow) -> Result<Self> {
        let quantity = Quantity::try_from(r.quantity)
            .map_err(|e| EcommerceError::StorageError(format!("order line of {} has invalid quantity: {e}", r.order_id)))?;
        Ok(OrderLine { product_id: ProductId::from_uuid(r.product_id), name: r.name, unit_price: Money::from_minor(r.unit_price_minor), quantity })
    }
}

fn quantity_column(q: Quantity) -> Result<i32> {
    i32::try_from(q.value()).map_err(|_| EcommerceError::StorageError(format!("quantity {q} out of range")))
}

impl PgStore {
    async fn order_lines(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderLine>>> {
        let rows = sqlx::query_as::<_, OrderLineRow>("SELECT order_id, product_id, name, unit_price_minor, quantity FROM order_lines WHERE order_id = ANY($1) ORDER BY position")
            .bind(order_ids).fetch_all(&self.db).await?;
        let mut grouped: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for row in rows {
            grouped.entry(row.order_id).or_default().push(row.try_into()?);
        }
        Ok(grouped)
    }

    async fn lock_line(tx: &mut Transaction<'_, Postgres>, line_id: CartLineId) -> Result<Option<CartLine>> {
        let row = sqlx::query_as::<_, CartLineRow>(&format!("SELECT {CART_COLUMNS} FROM cart_lines WHERE id = $1 FOR UPDATE"))
            .bind(line_id).fetch_optional(&mut **tx).await?;
        row.map(CartLine::try_from).transpose()
    }
}

#[async_trait]
impl CartStore for PgStore {
    #[instrument(skip(self), fields(%owner, %product_id))]
    async fn add_item(&self, owner: OwnerId, product_id: ProductId) -> Result<CartLine> {
        // Single statement: concurrent adds for the same product serialize on the unique index.
        let row = sqlx::query_as::<_, CartLineRow>(&format!(
            "INSERT INTO cart_lines (id, owner_id, product_id, quantity, created_at) VALUES ($1, $2, $3, 1, NOW()) \
             ON CONFLICT (owner_id, product_id) DO UPDATE SET quantity = cart_lines.quantity + 1 RETURNING {CART_COLUMNS}"))
            .bind(CartLineId::new()).bind(owner).bind(product_id)
            .fetch_one(&self.db).await?;
        row.try_into()
    }

    #[instrument(skip(self), fields(%owner, %line_id, ?change))]
    async fn change_quantity(&self, owner: OwnerId, line_id: CartLineId, change: QuantityChange) -> Result<Option<CartLine>> {
        let mut tx = self.db.begin().await?;
        let line = Self::lock_line(&mut tx, line_id).await?.ok_or(EcommerceError::CartLineNotFound)?;
        let updated = match line.transition(owner, change)? {
            LineTransition::Set(q) => {
                let row = sqlx::query_as::<_, CartLineRow>(&format!("UPDATE cart_lines SET quantity = $2 WHERE id = $1 RETURNING {CART_COLUMNS}"))
                    .bind(line_id).bind(quantity_column(q)?).fetch_one(&mut *tx).await?;
                Some(CartLine::try_from(row)?)
            }
            LineTransition::Remove => {
                sqlx::query("DELETE FROM cart_lines WHERE id = $1").bind(line_id).execute(&mut *tx).await?;
                None
            }
        };
        tx.commit().await?;
        Ok(updated)
    }

    #[instrument(skip(self), fields(%owner, %line_id))]
    async fn remove_item(&self, owner: OwnerId, line_id: CartLineId) -> Result<bool> {
        let mut tx = self.db.begin().await?;
        let Some(line) = Self::lock_line(&mut tx, line_id).await? else { return Ok(false) };
        if line.owner_id != owner { return Err(EcommerceError::Forbidden); }
        sqlx::query("DELETE FROM cart_lines WHERE id = $1").bind(line_id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn lines(&self, owner: OwnerId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query_as::<_, CartLineRow>(&format!("SELECT {CART_COLUMNS} FROM cart_lines WHERE owner_id = $1 ORDER BY created_at, id"))
            .bind(owner).fetch_all(&self.db).await?;
        rows.into_iter().map(CartLine::try_from).collect()
    }

    async fn drop_lines(&self, owner: OwnerId, line_ids: &[CartLineId]) -> Result<u64> {
        let ids: Vec<Uuid> = line_ids.iter().map(CartLineId::as_uuid).collect();
        let done = sqlx::query("DELETE FROM cart_lines WHERE owner_id = $1 AND id = ANY($2)")
            .bind(owner).bind(&ids).execute(&self.db).await?;
        Ok(done.rows_affected())
    }
}

#[async_trait]
impl OrderLedger for PgStore {
    async fn find_by_reference(&self, provider_reference: &str) -> Result<Option<Order>> {
        let Some(row) = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE provider_reference = $1"))
            .bind(provider_reference).fetch_optional(&self.db).await? else { return Ok(None) };
        let mut lines = self.order_lines(&[row.id]).await?;
        let lines = lines.remove(&row.id).unwrap_or_default();
        row.into_order(lines).map(Some)
    }

    #[instrument(skip(self, order), fields(owner = %order.owner_id, reference = %order.provider_reference))]
    async fn record_order(&self, order: &Order) -> Result<u64> {
        let mut tx = self.db.begin().await?;
        // A duplicate reference fails here with 23505 and the transaction rolls back on drop.
        sqlx::query("INSERT INTO orders (id, owner_id, total_minor, currency, provider_reference, status, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)")
            .bind(order.id).bind(order.owner_id).bind(order.total.minor()).bind(&order.currency)
            .bind(&order.provider_reference).bind(order.status.as_str()).bind(order.created_at)
            .execute(&mut *tx).await?;
        for (position, line) in order.lines.iter().enumerate() {
            sqlx::query("INSERT INTO order_lines (order_id, position, product_id, name, unit_price_minor, quantity) VALUES ($1, $2, $3, $4, $5, $6)")
                .bind(order.id).bind(i32::try_from(position).unwrap_or(i32::MAX)).bind(line.product_id).bind(&line.name)
                .bind(line.unit_price.minor()).bind(quantity_column(line.quantity)?)
                .execute(&mut *tx).await?;
        }
        let cleared = sqlx::query("DELETE FROM cart_lines WHERE owner_id = $1").bind(order.owner_id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(cleared.rows_affected())
    }

    async fn list_orders(&self, owner: OwnerId) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE owner_id = $1 ORDER BY created_at DESC"))
            .bind(owner).fetch_all(&self.db).await?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut lines = self.order_lines(&ids).await?;
        rows.into_iter().map(|r| { let l = lines.remove(&r.id).unwrap_or_default(); r.into_order(l) }).collect()
    }
}
