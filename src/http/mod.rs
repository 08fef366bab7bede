//! HTTP surface: JSON API for the storefront and the provider webhook endpoint.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::cart::CartService;
use crate::catalog::CatalogReader;
use crate::checkout::CheckoutOrchestrator;
use crate::reconcile::WebhookReconciler;
use crate::store::OrderLedger;

pub mod auth;
pub mod error;
pub mod handlers;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogReader>,
    pub cart: CartService,
    pub checkout: CheckoutOrchestrator,
    pub reconciler: WebhookReconciler,
    pub orders: Arc<dyn OrderLedger>,
}

pub fn router(state: AppState) -> Router {
    use handlers::*;
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/products", get(list_products))
        .route("/api/v1/products/:id", get(get_product))
        .route("/api/v1/cart", get(get_cart))
        .route("/api/v1/cart/items", post(add_to_cart))
        .route("/api/v1/cart/update", post(update_cart_item))
        .route("/api/v1/cart/remove", post(remove_cart_item))
        .route("/api/v1/checkout", post(checkout))
        .route("/api/v1/orders", get(list_orders))
        .route("/api/v1/webhooks/payment", post(payment_webhook))
        .route("/checkout/success", get(checkout_success))
        .route("/checkout/cancel", get(checkout_cancel))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixed::FixedCatalog;
    use crate::checkout::RedirectUrls;
    use crate::domain::aggregates::Product;
    use crate::domain::value_objects::{OwnerId, ProductId};
    use crate::events::recording::RecordingPublisher;
    use crate::payment::fake::FakeProvider;
    use crate::payment::signature::SIGNATURE_HEADER;
    use crate::payment::WebhookVerifier;
    use crate::store::memory::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct Harness { app: Router, verifier: WebhookVerifier, provider: Arc<FakeProvider>, store: Arc<MemoryStore>, tote: ProductId, mug: ProductId }

    fn harness() -> Harness {
        let tote = Product::with_minor_price(ProductId::new(), "Linen tote", 1999);
        let mug = Product::with_minor_price(ProductId::new(), "Enamel mug", 2450);
        let (t, m) = (tote.id, mug.id);
        let catalog: Arc<FixedCatalog> = Arc::new(FixedCatalog::with([tote, mug]));
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::default());
        let verifier = WebhookVerifier::new(SecretString::from("whsec_http_test".to_string()), 300);
        let cart = CartService::new(store.clone(), catalog.clone());
        let checkout = CheckoutOrchestrator::new(cart.clone(), provider.clone(), RedirectUrls::from_base("https://shop.example"), "usd");
        let reconciler = WebhookReconciler::new(verifier.clone(), store.clone(), cart.clone(), Arc::new(RecordingPublisher::default()), "usd");
        let state = AppState { catalog, cart, checkout, reconciler, orders: store.clone() };
        Harness { app: router(state), verifier, provider, store, tote: t, mug: m }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, body)
    }

    fn get_as(uri: &str, owner: Option<OwnerId>) -> Request<Body> {
        let mut b = Request::get(uri);
        if let Some(o) = owner { b = b.header(auth::OWNER_HEADER, o.to_string()); }
        b.body(Body::empty()).unwrap()
    }

    fn post_as(uri: &str, owner: OwnerId, body: Value) -> Request<Body> {
        Request::post(uri).header(auth::OWNER_HEADER, owner.to_string()).header("content-type", "application/json")
            .body(Body::from(body.to_string())).unwrap()
    }

    fn webhook(body: Vec<u8>, signature: &str) -> Request<Body> {
        Request::post("/api/v1/webhooks/payment").header(SIGNATURE_HEADER, signature).header("content-type", "application/json")
            .body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness();
        let (status, body) = send(&h.app, get_as("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_cart_requires_owner() {
        let h = harness();
        let (status, body) = send(&h.app, get_as("/api/v1/cart", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Not authenticated");

        let req = Request::get("/api/v1/cart").header(auth::OWNER_HEADER, "not-a-uuid").body(Body::empty()).unwrap();
        assert_eq!(send(&h.app, req).await.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_full_purchase_flow() {
        let h = harness();
        let owner = OwnerId::new();

        let (status, _) = send(&h.app, post_as("/api/v1/cart/items", owner, json!({ "product_id": h.tote }))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, line) = send(&h.app, post_as("/api/v1/cart/items", owner, json!({ "product_id": h.mug }))).await;
        let (status, cart) = send(&h.app, post_as("/api/v1/cart/update", owner, json!({ "cart_line_id": line["id"], "action": "increment" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cart["total"], 6899);
        assert_eq!(cart["item_count"], 3);

        let (status, redirect) = send(&h.app, post_as("/api/v1/checkout", owner, json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(redirect["total"], 6899);
        let session = redirect["session_id"].as_str().unwrap().to_string();
        assert_eq!(h.provider.calls(), 1);

        let event = serde_json::to_vec(&json!({
            "id": "evt_1", "type": "checkout.session.completed",
            "data": { "object": { "id": session, "client_reference_id": owner.to_string(), "payment_status": "paid", "amount_total": 6899, "currency": "usd" } }
        })).unwrap();
        let signature = h.verifier.sign(&event, Utc::now().timestamp());

        let (status, ack) = send(&h.app, webhook(event.clone(), &signature)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["received"], true);
        assert_eq!(ack["outcome"], "applied");

        let (status, ack) = send(&h.app, webhook(event, &signature)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["outcome"], "already_applied");

        let (_, cart) = send(&h.app, get_as("/api/v1/cart", Some(owner))).await;
        assert_eq!(cart["lines"].as_array().unwrap().len(), 0);
        let (_, orders) = send(&h.app, get_as("/api/v1/orders", Some(owner))).await;
        assert_eq!(orders.as_array().unwrap().len(), 1);
        assert_eq!(orders[0]["total"], 6899);
    }

    #[tokio::test]
    async fn test_checkout_empty_cart_conflict() {
        let h = harness();
        let (status, body) = send(&h.app, post_as("/api/v1/checkout", OwnerId::new(), json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Your cart is empty");
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_foreign_line_forbidden() {
        let h = harness();
        let (alice, bob) = (OwnerId::new(), OwnerId::new());
        let (_, line) = send(&h.app, post_as("/api/v1/cart/items", alice, json!({ "product_id": h.tote }))).await;

        let (status, _) = send(&h.app, post_as("/api/v1/cart/remove", bob, json!({ "cart_line_id": line["id"] }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (_, cart) = send(&h.app, get_as("/api/v1/cart", Some(alice))).await;
        assert_eq!(cart["lines"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_product_not_found() {
        let h = harness();
        let (status, _) = send(&h.app, post_as("/api/v1/cart/items", OwnerId::new(), json!({ "product_id": ProductId::new() }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&h.app, get_as(&format!("/api/v1/products/{}", ProductId::new()), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_webhook_bad_signature_rejected() {
        let h = harness();
        let owner = OwnerId::new();
        send(&h.app, post_as("/api/v1/cart/items", owner, json!({ "product_id": h.tote }))).await;
        let event = serde_json::to_vec(&json!({
            "id": "evt_forged", "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_forged", "client_reference_id": owner.to_string(), "payment_status": "paid", "amount_total": 1 } }
        })).unwrap();

        let (status, _) = send(&h.app, webhook(event.clone(), "t=1,v1=deadbeef")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let req = Request::post("/api/v1/webhooks/payment").body(Body::from(event)).unwrap();
        assert_eq!(send(&h.app, req).await.0, StatusCode::BAD_REQUEST);

        assert_eq!(h.store.order_count().await, 0);
        let (_, cart) = send(&h.app, get_as("/api/v1/cart", Some(owner))).await;
        assert_eq!(cart["lines"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_return_pages_have_no_side_effects() {
        let h = harness();
        let owner = OwnerId::new();
        send(&h.app, post_as("/api/v1/cart/items", owner, json!({ "product_id": h.tote }))).await;

        let (status, body) = send(&h.app, get_as("/checkout/success?session_id=cs_test_1", Some(owner))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_id"], "cs_test_1");
        assert_eq!(send(&h.app, get_as("/checkout/cancel", Some(owner))).await.0, StatusCode::OK);

        assert_eq!(h.store.order_count().await, 0);
        let (_, cart) = send(&h.app, get_as("/api/v1/cart", Some(owner))).await;
        assert_eq!(cart["lines"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_products_paginates() {
        let h = harness();
        let (status, body) = send(&h.app, get_as("/api/v1/products?page=1&per_page=1", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["per_page"], 1);
    }

    #[tokio::test]
    async fn test_list_products_far_page_is_empty() {
        let h = harness();
        let (status, body) = send(&h.app, get_as(&format!("/api/v1/products?page={}&per_page=100", u32::MAX), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].as_array().unwrap().is_empty());
        assert_eq!(body["page"], u32::MAX);
    }
}
