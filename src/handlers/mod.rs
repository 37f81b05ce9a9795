pub mod auth;
pub mod cart;
pub mod common;
pub mod delivery;
pub mod health;
pub mod orders;
pub mod products;
pub mod users;

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::StoreHandle,
    services::{AccountService, CartService, FulfillmentService, OrderService, ProductService},
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub accounts: Arc<AccountService>,
    pub products: Arc<ProductService>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub fulfillment: Arc<FulfillmentService>,
}

impl AppServices {
    pub fn new(db: StoreHandle, auth: Arc<AuthService>, config: &AppConfig) -> Self {
        Self {
            accounts: Arc::new(AccountService::new(db.clone(), auth)),
            products: Arc::new(ProductService::new(
                db.clone(),
                config.default_page_size,
                config.max_page_size,
            )),
            carts: Arc::new(CartService::new(db.clone())),
            orders: Arc::new(OrderService::new(db.clone(), config.stock_guard)),
            fulfillment: Arc::new(FulfillmentService::new(db)),
        }
    }
}
