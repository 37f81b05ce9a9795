//! Storefront API Library
//!
//! REST backend for an e-commerce storefront: accounts and sessions, the product
//! catalog, per-user carts, transactional order placement and delivery fulfillment.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod services;
pub mod tracing;

use axum::{
    extract::{Request, State},
    middleware::{from_fn, from_fn_with_state, Next},
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;

use crate::auth::{AuthConfig, AuthService};
use crate::config::AppConfig;
use crate::db::StoreHandle;
use crate::handlers::AppServices;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: StoreHandle,
    pub config: AppConfig,
    pub auth: Arc<AuthService>,
    pub services: AppServices,
}

impl AppState {
    /// Wires every service around one shared store handle.
    pub fn new(db: StoreHandle, config: AppConfig) -> Self {
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config), db.clone()));
        let services = AppServices::new(db.clone(), auth.clone(), &config);
        Self {
            db,
            config,
            auth,
            services,
        }
    }
}

/// All `/api` routes, with per-group authentication and role requirements.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/auth", handlers::auth::auth_routes())
        .nest("/products", handlers::products::product_routes())
        .nest("/cart", handlers::cart::cart_routes())
        .nest("/orders", handlers::orders::order_routes())
        .nest("/delivery", handlers::delivery::delivery_routes())
        .nest("/users", handlers::users::user_routes())
}

// Inject AuthService into request extensions for auth middleware
async fn inject_auth_service(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(auth);
    next.run(request).await
}

/// Full application router. CORS is left to the binary since it depends on deployment.
pub fn app_router(state: AppState) -> Router {
    let timeout = state.config.request_timeout();
    let auth = state.auth.clone();

    Router::new()
        .nest("/api", api_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(TimeoutLayer::new(timeout))
        .layer(from_fn_with_state(auth, inject_auth_service))
        // Ensure every request carries a request id for traceability
        .layer(from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(Arc::new(state))
}
