use super::common::{message_response, message_with, parse_id, success_response, JsonBody};
use crate::{
    auth::{AuthRouterExt, Principal},
    errors::ServiceError,
    handlers::AppState,
    services::carts::{AddToCartRequest, UpdateCartItemRequest},
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use std::sync::Arc;

pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.carts.get_cart(principal.user_id).await?;
    Ok(success_response(cart))
}

pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    JsonBody(request): JsonBody<AddToCartRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state
        .services
        .carts
        .add_item(principal.user_id, request)
        .await?;
    Ok(message_with("Item added to cart", "cart", cart))
}

pub async fn update_cart_item(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(product_id): Path<String>,
    JsonBody(request): JsonBody<UpdateCartItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let product_id = parse_id(&product_id, "product")?;
    let cart = state
        .services
        .carts
        .update_item(principal.user_id, product_id, request)
        .await?;
    Ok(message_with("Cart item updated", "cart", cart))
}

pub async fn remove_from_cart(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let product_id = parse_id(&product_id, "product")?;
    let cart = state
        .services
        .carts
        .remove_item(principal.user_id, product_id)
        .await?;
    Ok(message_with("Item removed from cart", "cart", cart))
}

pub async fn clear_cart(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.carts.clear(principal.user_id).await?;
    Ok(message_response("Cart cleared"))
}

pub fn cart_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_cart).post(add_to_cart).delete(clear_cart))
        .route("/:product_id", put(update_cart_item).delete(remove_from_cart))
        .with_auth()
}
