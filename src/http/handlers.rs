//! Request handlers. Each one resolves the owner, calls a service and maps the result.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::auth::Owner;
use super::AppState;
use crate::cart::CartView;
use crate::checkout::CheckoutRedirect;
use crate::domain::aggregates::{CartLine, Order, Product};
use crate::domain::value_objects::{CartLineId, ProductId, QuantityChange};
use crate::payment::signature::SIGNATURE_HEADER;
use crate::reconcile::Acknowledgement;
use crate::{EcommerceError, Result};

#[derive(Debug, Deserialize)] pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32> }
#[derive(Debug, Serialize)] pub struct PaginatedResponse<T> { pub data: Vec<T>, pub page: u32, pub per_page: u32 }

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": "storefront-checkout" }))
}

pub async fn list_products(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<Product>>> {
    let page = p.page.unwrap_or(1).max(1); let per_page = p.per_page.unwrap_or(20).clamp(1, 100);
    // Widened before multiplying: any u32 page times at most 100 fits an i64.
    let offset = i64::from(page - 1) * i64::from(per_page);
    let data = s.catalog.list_products(i64::from(per_page), offset).await?;
    Ok(Json(PaginatedResponse { data, page, per_page }))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<ProductId>) -> Result<Json<Product>> {
    s.catalog.get_product(id).await?.map(Json).ok_or(EcommerceError::ProductNotFound)
}

pub async fn get_cart(State(s): State<AppState>, Owner(owner): Owner) -> Result<Json<CartView>> {
    Ok(Json(s.cart.view(owner).await?))
}

#[derive(Debug, Deserialize)] pub struct AddItemRequest { pub product_id: ProductId }

pub async fn add_to_cart(State(s): State<AppState>, Owner(owner): Owner, Json(r): Json<AddItemRequest>) -> Result<(StatusCode, Json<CartLine>)> {
    let line = s.cart.add_item(owner, r.product_id).await?;
    Ok((StatusCode::CREATED, Json(line)))
}

#[derive(Debug, Deserialize)] pub struct UpdateItemRequest { pub cart_line_id: CartLineId, pub action: QuantityChange }

pub async fn update_cart_item(State(s): State<AppState>, Owner(owner): Owner, Json(r): Json<UpdateItemRequest>) -> Result<Json<CartView>> {
    s.cart.change_quantity(owner, r.cart_line_id, r.action).await?;
    Ok(Json(s.cart.view(owner).await?))
}

#[derive(Debug, Deserialize)] pub struct RemoveItemRequest { pub cart_line_id: CartLineId }

pub async fn remove_cart_item(State(s): State<AppState>, Owner(owner): Owner, Json(r): Json<RemoveItemRequest>) -> Result<Json<CartView>> {
    s.cart.remove_item(owner, r.cart_line_id).await?;
    Ok(Json(s.cart.view(owner).await?))
}

pub async fn checkout(State(s): State<AppState>, Owner(owner): Owner) -> Result<Json<CheckoutRedirect>> {
    Ok(Json(s.checkout.begin_checkout(owner).await?))
}

#[derive(Debug, Deserialize)] pub struct SuccessParams { pub session_id: Option<String> }

/// Landing page after the hosted checkout. The order is created by the webhook, never here.
pub async fn checkout_success(Query(p): Query<SuccessParams>) -> Json<serde_json::Value> {
    Json(json!({ "status": "processing", "session_id": p.session_id, "message": "Thank you! Your payment is being confirmed." }))
}

pub async fn checkout_cancel() -> Json<serde_json::Value> {
    Json(json!({ "status": "cancelled", "message": "Checkout was cancelled. Your cart has been kept." }))
}

pub async fn list_orders(State(s): State<AppState>, Owner(owner): Owner) -> Result<Json<Vec<Order>>> {
    Ok(Json(s.orders.list_orders(owner).await?))
}

#[derive(Debug, Serialize)]
pub struct WebhookReceipt {
    pub received: bool,
    #[serde(flatten)]
    pub outcome: Acknowledgement,
}

/// Takes the body as raw bytes: the signature covers the exact payload.
pub async fn payment_webhook(State(s): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<WebhookReceipt>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok())
        .ok_or_else(|| EcommerceError::InvalidSignature("missing signature header".into()))?;
    let outcome = s.reconciler.handle_event(&body, signature).await?;
    info!(?outcome, "webhook acknowledged");
    Ok(Json(WebhookReceipt { received: true, outcome }))
}
