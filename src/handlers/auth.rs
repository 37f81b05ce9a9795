use super::common::{created_response, message_response, success_response, JsonBody};
use crate::{
    auth::{
        AuthRouterExt, ChangePasswordRequest, LoginRequest, Principal, ProfileUpdate,
        RefreshTokenRequest, SignupRequest,
    },
    errors::ServiceError,
    handlers::AppState,
};
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use validator::Validate;

pub async fn signup(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<SignupRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.services.accounts.signup(request).await?;
    Ok(created_response(response))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.services.accounts.login(request).await?;
    Ok(success_response(response))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<RefreshTokenRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    request.validate()?;
    let response = state
        .services
        .accounts
        .refresh(&request.refresh_token)
        .await?;
    Ok(success_response(response))
}

/// Tokens are stateless; logging out is the client discarding them.
pub async fn logout(_principal: Principal) -> impl IntoResponse {
    message_response("Logged out successfully")
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<impl IntoResponse, ServiceError> {
    let user = state.services.accounts.profile(principal.user_id).await?;
    Ok(success_response(user))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    JsonBody(update): JsonBody<ProfileUpdate>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = state
        .services
        .accounts
        .update_profile(principal.user_id, update)
        .await?;
    Ok(success_response(user))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    JsonBody(request): JsonBody<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .accounts
        .change_password(principal.user_id, request)
        .await?;
    Ok(message_response("Password updated successfully"))
}

pub fn auth_routes() -> Router<Arc<AppState>> {
    let public = Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh", post(refresh));

    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/password", put(change_password))
        .with_auth();

    public.merge(protected)
}
