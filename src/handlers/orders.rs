use super::common::{created_response, message_with, parse_id, success_response, JsonBody};
use crate::{
    auth::{AuthRouterExt, Principal},
    entities::UserRole,
    errors::ServiceError,
    handlers::AppState,
    services::{fulfillment::UpdateStatusRequest, orders::PlaceOrderRequest},
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use std::sync::Arc;

/// Places an order from the submitted lines and clears the caller's cart.
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    JsonBody(request): JsonBody<PlaceOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .place_order(principal.user_id, request)
        .await?;
    Ok(created_response(order))
}

pub async fn list_my_orders(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state
        .services
        .fulfillment
        .list_mine(principal.user_id)
        .await?;
    Ok(success_response(orders))
}

pub async fn get_order(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "order")?;
    let order = state.services.fulfillment.get_one(id, &principal).await?;
    Ok(success_response(order))
}

pub async fn list_all_orders(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.fulfillment.list_all().await?;
    Ok(success_response(orders))
}

pub async fn update_order_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "order")?;
    let order = state
        .services
        .fulfillment
        .update_status(id, request.status)
        .await?;
    Ok(message_with("Order status updated", "order", order))
}

pub async fn assign_order(
    State(state): State<Arc<AppState>>,
    Path((order_id, delivery_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServiceError> {
    let order_id = parse_id(&order_id, "order")?;
    let delivery_id = parse_id(&delivery_id, "delivery")?;
    let order = state
        .services
        .fulfillment
        .assign_to_agent(order_id, delivery_id)
        .await?;
    Ok(message_with("Order assigned to delivery agent", "order", order))
}

pub fn order_routes() -> Router<Arc<AppState>> {
    let customer = Router::new()
        .route("/", get(list_my_orders).post(create_order))
        .route("/:id", get(get_order))
        .with_auth();

    let admin = Router::new()
        .route("/all", get(list_all_orders))
        .route("/:id/status", put(update_order_status))
        .route("/:id/assign/:delivery_id", put(assign_order))
        .with_role(UserRole::Admin);

    customer.merge(admin)
}
