#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use serde_json::Value;
use storefront_api::{
    app_router,
    auth::SignupRequest,
    config::{AppConfig, StockGuard},
    db::{self, DbPool},
    entities::{product, user, Product, UserRole},
    services::catalog::CreateProductRequest,
    AppState,
};
use sea_orm::EntityTrait;
use tower::ServiceExt;
use uuid::Uuid;

pub const SECRET: &str = "Vq7mL2xR9tKp4Wn8Zc3Hy6Jd1Fs5Gb0Q";
pub const PASSWORD: &str = "hunter22";

/// A seeded account plus a ready-to-use access token.
pub struct Account {
    pub user: user::Model,
    pub token: String,
}

impl Account {
    pub fn id(&self) -> Uuid {
        self.user.id
    }
}

/// Helper harness for spinning up the application over an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::with_stock_guard(StockGuard::Conditional).await
    }

    pub async fn with_stock_guard(stock_guard: StockGuard) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            SECRET.to_string(),
            "test".to_string(),
        );
        // One connection keeps every query on the same in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.stock_guard = stock_guard;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = app_router(state.clone());

        Self { router, state }
    }

    pub fn db(&self) -> &DbPool {
        &self.state.db
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Sends a request and decodes the JSON response body.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body, token).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response body is not JSON")
        };
        (status, json)
    }

    /// Registers an account with `role` and issues it a token without a login round trip.
    pub async fn seed_account(&self, email: &str, role: UserRole) -> Account {
        let user = self
            .state
            .services
            .accounts
            .register(
                SignupRequest {
                    email: email.to_string(),
                    password: PASSWORD.to_string(),
                },
                role,
            )
            .await
            .expect("seed account");
        let token = self
            .state
            .auth
            .generate_token(&user)
            .expect("issue token")
            .access_token;
        Account { user, token }
    }

    pub async fn customer(&self, email: &str) -> Account {
        self.seed_account(email, UserRole::Customer).await
    }

    pub async fn admin(&self) -> Account {
        self.seed_account("admin@example.com", UserRole::Admin).await
    }

    pub async fn agent(&self, email: &str) -> Account {
        self.seed_account(email, UserRole::Delivery).await
    }

    pub async fn seed_product(
        &self,
        title: &str,
        category: &str,
        price: Decimal,
        stock: i32,
    ) -> Uuid {
        self.state
            .services
            .products
            .create(CreateProductRequest {
                title: title.to_string(),
                description: format!("{} description", title),
                price,
                stock,
                images: vec![format!("https://cdn.example.com/{}.png", title.to_lowercase())],
                category: category.to_string(),
            })
            .await
            .expect("seed product")
            .id
    }

    /// Current stock straight from the store.
    pub async fn stock_of(&self, product_id: Uuid) -> i32 {
        self.product(product_id)
            .await
            .expect("product should exist")
            .stock
    }

    pub async fn product(&self, product_id: Uuid) -> Option<product::Model> {
        Product::find_by_id(product_id)
            .one(self.db())
            .await
            .expect("read product")
    }
}
