//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::Product;
pub use order::{Order, OrderError, OrderLine, OrderStatus};
pub use cart::{Cart, CartError, CartLine, LineTransition};
