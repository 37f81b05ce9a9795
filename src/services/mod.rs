//! Business logic. Each service owns a handle to the store and is cheap to clone.

pub mod accounts;
pub mod carts;
pub mod catalog;
pub mod fulfillment;
pub mod order_status;
pub mod orders;

pub use accounts::AccountService;
pub use carts::CartService;
pub use catalog::ProductService;
pub use fulfillment::FulfillmentService;
pub use orders::OrderService;
