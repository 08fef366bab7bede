//! Storefront checkout service

use std::sync::Arc;

use anyhow::Result;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_checkout::cart::CartService;
use storefront_checkout::catalog::{CatalogReader, PgCatalog};
use storefront_checkout::checkout::{CheckoutOrchestrator, RedirectUrls};
use storefront_checkout::config::AppConfig;
use storefront_checkout::events::{EventPublisher, LogPublisher, NatsPublisher};
use storefront_checkout::http::{router, AppState};
use storefront_checkout::payment::{StripeClient, WebhookVerifier};
use storefront_checkout::reconcile::WebhookReconciler;
use storefront_checkout::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = AppConfig::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    let db = PgPoolOptions::new().max_connections(config.database_max_connections).connect(config.database_url.expose_secret()).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let publisher: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url).await {
            Ok(client) => Arc::new(NatsPublisher::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, domain events will only be logged");
                Arc::new(LogPublisher)
            }
        },
        None => Arc::new(LogPublisher),
    };

    let store = Arc::new(PgStore::new(db.clone()));
    let catalog: Arc<dyn CatalogReader> = Arc::new(PgCatalog::new(db));
    let provider = Arc::new(StripeClient::new(&config.payment.api_base, config.payment.secret_key.clone(), config.payment.timeout)?);
    let verifier = WebhookVerifier::new(config.payment.webhook_secret.clone(), config.payment.webhook_tolerance_secs);

    let cart = CartService::new(store.clone(), catalog.clone());
    let checkout = CheckoutOrchestrator::new(cart.clone(), provider, RedirectUrls::from_base(&config.public_base_url), config.currency.clone());
    let reconciler = WebhookReconciler::new(verifier, store.clone(), cart.clone(), publisher, config.currency.clone());
    let app = router(AppState { catalog, cart, checkout, reconciler, orders: store });

    tracing::info!("Storefront checkout listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
