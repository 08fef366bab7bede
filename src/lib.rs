//! Storefront checkout core
//!
//! Per-owner shopping carts, hosted checkout through an external payment
//! provider, and reconciliation of the provider's signed webhook events into
//! paid orders.
//!
//! ## Flow
//! - Cart lines are mutated per owner (`cart`)
//! - Totals are always recomputed from the catalog (`pricing`)
//! - Checkout hands a priced snapshot to the provider (`checkout`)
//! - Verified payment events settle exactly one order per payment and retire the cart (`reconcile`)

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod events;
pub mod http;
pub mod payment;
pub mod pricing;
pub mod reconcile;
pub mod store;

use thiserror::Error;
use crate::domain::aggregates::CartError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Cart line belongs to another owner")]
    Forbidden,

    #[error("Product not found")]
    ProductNotFound,

    #[error("Cart line not found")]
    CartLineNotFound,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Payment provider unavailable: {0}")]
    PaymentProviderUnavailable(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid webhook event: {0}")]
    InvalidEvent(String),

    #[error("Invalid catalog price: {0}")]
    InvalidPrice(String),

    #[error("Storage conflict: {0}")]
    StorageConflict(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<CartError> for EcommerceError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::LineNotFound => Self::CartLineNotFound,
            CartError::Forbidden => Self::Forbidden,
        }
    }
}

impl From<sqlx::Error> for EcommerceError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::StorageConflict(db.message().to_string()),
            _ => Self::StorageError(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EcommerceError>;
