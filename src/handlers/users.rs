use super::common::{message_with, parse_id, success_response, QueryParams};
use crate::{
    auth::AuthRouterExt,
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
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<UserListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let users = state.services.accounts.list_users(query.role).await?;
    Ok(success_response(users))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "user")?;
    let user = state.services.accounts.get_user(id).await?;
    Ok(success_response(user))
}

pub async fn block_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "user")?;
    let user = state.services.accounts.set_active(id, false).await?;
    Ok(message_with("User blocked successfully", "user", user))
}

pub async fn unblock_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "user")?;
    let user = state.services.accounts.set_active(id, true).await?;
    Ok(message_with("User unblocked successfully", "user", user))
}

pub fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users))
        .route("/:id", get(get_user))
        .route("/:id/block", put(block_user))
        .route("/:id/unblock", put(unblock_user))
        .with_role(UserRole::Admin)
}
