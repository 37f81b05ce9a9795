use super::common::{message_with, parse_id, success_response};
use crate::{
    auth::{AuthRouterExt, Principal},
    entities::UserRole,
    errors::ServiceError,
    handlers::AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use std::sync::Arc;

pub async fn assigned_orders(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state
        .services
        .fulfillment
        .list_assigned(principal.user_id)
        .await?;
    Ok(success_response(orders))
}

pub async fn mark_delivered(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "order")?;
    let order = state
        .services
        .fulfillment
        .mark_delivered(id, principal.user_id)
        .await?;
    Ok(message_with("Order marked as delivered", "order", order))
}

pub fn delivery_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", get(assigned_orders))
        .route("/orders/:id/delivered", put(mark_delivered))
        .with_role(UserRole::Delivery)
}
