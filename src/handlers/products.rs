use super::common::{
    created_response, message_response, parse_id, success_response, JsonBody, QueryParams,
};
use crate::{
    auth::AuthRouterExt,
    entities::UserRole,
    errors::ServiceError,
    handlers::AppState,
    services::catalog::{CreateProductRequest, ProductQuery, ProductUpdate},
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub async fn list_products(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<ProductQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state.services.products.list(query).await?;
    Ok(success_response(page))
}

pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "product")?;
    let product = state.services.products.get(id).await?;
    Ok(success_response(product))
}

pub async fn create_product(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<CreateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.products.create(request).await?;
    Ok(created_response(product))
}

pub async fn update_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(update): JsonBody<ProductUpdate>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "product")?;
    let product = state.services.products.update(id, update).await?;
    Ok(success_response(product))
}

pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "product")?;
    state.services.products.delete(id).await?;
    Ok(message_response("Product deleted successfully"))
}

pub fn product_routes() -> Router<Arc<AppState>> {
    let public = Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product));

    let admin = Router::new()
        .route("/", post(create_product))
        .route("/:id", axum::routing::put(update_product).delete(delete_product))
        .with_role(UserRole::Admin);

    public.merge(admin)
}
