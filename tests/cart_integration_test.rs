mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn first_read_returns_an_empty_cart() {
    let app = TestApp::new().await;
    let buyer = app.customer("buyer@example.com").await;

    let (status, cart) = app.call(Method::GET, "/api/cart", None, Some(&buyer.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart, json!({ "items": [], "total": 0 }));
}

#[tokio::test]
async fn adding_the_same_product_twice_sums_quantities() {
    let app = TestApp::new().await;
    let buyer = app.customer("buyer@example.com").await;
    let mug = app.seed_product("Mug", "kitchen", dec!(12.5), 10).await;

    for quantity in [2, 3] {
        let (status, body) = app
            .call(
                Method::POST,
                "/api/cart",
                Some(json!({ "productId": mug, "quantity": quantity })),
                Some(&buyer.token),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["message"], "Item added to cart");
    }

    let (_, cart) = app.call(Method::GET, "/api/cart", None, Some(&buyer.token)).await;
    assert_eq!(cart["total"], 1);
    assert_eq!(cart["items"][0]["quantity"], 5);
    assert_eq!(cart["items"][0]["product"]["title"], "Mug");
    assert_eq!(cart["items"][0]["product"]["price"], json!(12.5));
}

#[tokio::test]
async fn adding_more_than_stock_is_rejected() {
    let app = TestApp::new().await;
    let buyer = app.customer("buyer@example.com").await;
    let lamp = app.seed_product("Lamp", "home", dec!(7.25), 2).await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/cart",
            Some(json!({ "productId": lamp, "quantity": 3 })),
            Some(&buyer.token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Insufficient stock");

    let (status, body) = app
        .call(
            Method::POST,
            "/api/cart",
            Some(json!({ "productId": uuid::Uuid::new_v4(), "quantity": 1 })),
            Some(&buyer.token),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Product not found");
}

#[tokio::test]
async fn update_and_remove_lines() {
    let app = TestApp::new().await;
    let buyer = app.customer("buyer@example.com").await;
    let mug = app.seed_product("Mug", "kitchen", dec!(12.5), 10).await;
    let lamp = app.seed_product("Lamp", "home", dec!(7.25), 10).await;

    for product in [mug, lamp] {
        app.call(
            Method::POST,
            "/api/cart",
            Some(json!({ "productId": product, "quantity": 1 })),
            Some(&buyer.token),
        )
        .await;
    }

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/cart/{mug}"),
            Some(json!({ "quantity": 4 })),
            Some(&buyer.token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Cart item updated");
    assert_eq!(body["cart"]["items"][0]["quantity"], 4);

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/cart/{mug}"),
            Some(json!({ "quantity": 0 })),
            Some(&buyer.token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(Method::DELETE, &format!("/api/cart/{lamp}"), None, Some(&buyer.token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cart"]["total"], 1);

    let (status, body) = app
        .call(Method::DELETE, &format!("/api/cart/{lamp}"), None, Some(&buyer.token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Item not found in cart");
}

#[tokio::test]
async fn updating_before_any_cart_exists_is_not_found() {
    let app = TestApp::new().await;
    let buyer = app.customer("buyer@example.com").await;
    let mug = app.seed_product("Mug", "kitchen", dec!(12.5), 10).await;

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/cart/{mug}"),
            Some(json!({ "quantity": 1 })),
            Some(&buyer.token),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Cart not found");
}

#[tokio::test]
async fn deleted_products_drop_out_of_the_cart_view() {
    let app = TestApp::new().await;
    let buyer = app.customer("buyer@example.com").await;
    let admin = app.admin().await;
    let mug = app.seed_product("Mug", "kitchen", dec!(12.5), 10).await;
    let lamp = app.seed_product("Lamp", "home", dec!(7.25), 10).await;

    for product in [mug, lamp] {
        app.call(
            Method::POST,
            "/api/cart",
            Some(json!({ "productId": product, "quantity": 1 })),
            Some(&buyer.token),
        )
        .await;
    }

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/products/{mug}"), None, Some(&admin.token))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, cart) = app.call(Method::GET, "/api/cart", None, Some(&buyer.token)).await;
    assert_eq!(cart["total"], 1);
    assert_eq!(cart["items"][0]["productId"], json!(lamp));
}

#[tokio::test]
async fn clearing_empties_only_the_callers_cart() {
    let app = TestApp::new().await;
    let buyer = app.customer("buyer@example.com").await;
    let other = app.customer("other@example.com").await;
    let mug = app.seed_product("Mug", "kitchen", dec!(12.5), 10).await;

    for account in [&buyer, &other] {
        app.call(
            Method::POST,
            "/api/cart",
            Some(json!({ "productId": mug, "quantity": 1 })),
            Some(&account.token),
        )
        .await;
    }

    let (status, body) = app.call(Method::DELETE, "/api/cart", None, Some(&buyer.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Cart cleared");

    let (_, mine) = app.call(Method::GET, "/api/cart", None, Some(&buyer.token)).await;
    let (_, theirs) = app.call(Method::GET, "/api/cart", None, Some(&other.token)).await;
    assert_eq!(mine["total"], 0);
    assert_eq!(theirs["total"], 1);
}

#[tokio::test]
async fn cart_requires_a_session() {
    let app = TestApp::new().await;
    let (status, _) = app.call(Method::GET, "/api/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
