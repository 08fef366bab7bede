//! Stripe Checkout (hosted) client over plain HTTPS.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{error, instrument};

use super::{PaymentProvider, ProviderSession, SessionRequest};
use crate::{EcommerceError, Result};

pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse { error: ErrorBody }

#[derive(Debug, Deserialize)]
struct ErrorBody { message: Option<String> }

impl StripeClient {
    pub fn new(api_base: impl Into<String>, secret_key: SecretString, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EcommerceError::PaymentProviderUnavailable(format!("http client: {e}")))?;
        Ok(Self { http, api_base: api_base.into().trim_end_matches('/').to_string(), secret_key })
    }

    /// Form fields in the provider's bracket notation.
    pub fn form_fields(request: &SessionRequest) -> Vec<(String, String)> {
        let mut fields = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            ("client_reference_id".to_string(), request.client_reference.clone()),
            ("metadata[owner_id]".to_string(), request.client_reference.clone()),
            ("metadata[expected_total]".to_string(), request.total.minor().to_string()),
        ];
        for (i, item) in request.line_items.iter().enumerate() {
            let key = |k: &str| format!("line_items[{i}]{k}");
            fields.push((key("[quantity]"), item.quantity.to_string()));
            fields.push((key("[price_data][currency]"), request.currency.clone()));
            fields.push((key("[price_data][unit_amount]"), item.unit_amount.minor().to_string()));
            fields.push((key("[price_data][product_data][name]"), item.name.clone()));
        }
        fields
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    #[instrument(skip(self, request), fields(reference = %request.client_reference, total = %request.total))]
    async fn create_checkout_session(&self, request: &SessionRequest) -> Result<ProviderSession> {
        let unavailable = |e: reqwest::Error| {
            error!(error = %e, "checkout session request failed");
            EcommerceError::PaymentProviderUnavailable(e.to_string())
        };
        let response = self.http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&Self::form_fields(request))
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.json::<ErrorResponse>().await.ok().and_then(|e| e.error.message).unwrap_or_default();
            error!(%status, %message, "provider rejected checkout session");
            return Err(EcommerceError::PaymentProviderUnavailable(format!("provider returned {status}")));
        }

        let session: SessionResponse = response.json().await.map_err(unavailable)?;
        let redirect_url = session.url.ok_or_else(|| EcommerceError::PaymentProviderUnavailable("no checkout URL returned".into()))?;
        Ok(ProviderSession { id: session.id, redirect_url })
    }
}
