//! Mapping of `EcommerceError` onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::EcommerceError;

impl EcommerceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::ProductNotFound | Self::CartLineNotFound => StatusCode::NOT_FOUND,
            Self::EmptyCart | Self::StorageConflict(_) => StatusCode::CONFLICT,
            Self::InvalidSignature(_) | Self::InvalidEvent(_) => StatusCode::BAD_REQUEST,
            Self::PaymentProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidPrice(_) | Self::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EcommerceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        }

        // Internal and provider details stay in the logs.
        let message = match &self {
            Self::StorageError(_) | Self::InvalidPrice(_) | Self::StorageConflict(_) => "Internal error, please retry".to_string(),
            Self::PaymentProviderUnavailable(_) => "Payment service is unavailable, please try again shortly".to_string(),
            Self::InvalidSignature(_) => "Invalid signature".to_string(),
            Self::EmptyCart => "Your cart is empty".to_string(),
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(EcommerceError::NotAuthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(EcommerceError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(EcommerceError::ProductNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(EcommerceError::EmptyCart.status(), StatusCode::CONFLICT);
        assert_eq!(EcommerceError::InvalidSignature("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(EcommerceError::PaymentProviderUnavailable("x".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(EcommerceError::StorageError("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let response = EcommerceError::StorageError("password authentication failed for user shop".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(!body.contains("password"), "{body}");
        assert!(body.contains("Internal error"));

        let response = EcommerceError::PaymentProviderUnavailable("401 invalid api key sk_live_x".into()).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(!String::from_utf8_lossy(&body).contains("sk_live_x"));
    }
}
