//! Owner identity supplied by the upstream identity layer.
//!
//! Sessions and login live in front of this service; by the time a request
//! gets here the gateway has replaced any client-sent value with the
//! authenticated account id.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::value_objects::OwnerId;
use crate::EcommerceError;

pub const OWNER_HEADER: &str = "x-owner-id";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Owner(pub OwnerId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.headers.get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<OwnerId>().ok())
            .map(Owner)
            .ok_or(EcommerceError::NotAuthenticated)
    }
}
