/*!
 * # Authentication and Authorization Module
 *
 * Session tokens are HS256 JWTs. A login issues an access token and a longer-lived
 * refresh token; each protected request re-checks the account against the store so
 * that blocking a user takes effect on the very next request.
 *
 * Authorization is an exact role match; there is no role hierarchy.
 */

use crate::entities::{user, User, UserRole};
use crate::errors::ServiceError;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

pub mod password;
mod types;

pub use types::*;

/// Distinguishes the two halves of a token pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,     // Subject (user ID)
    pub email: String,   // User's email at issuance
    pub role: UserRole,  // User's role at issuance
    pub kind: TokenKind, // access or refresh
    pub jti: String,     // JWT ID
    pub iat: i64,        // Issued at time
    pub exp: i64,        // Expiration time
}

/// The authenticated caller, produced once per protected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl Principal {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.role == role
    }
}

impl From<&user::Model> for Principal {
    fn from(user: &user::Model) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_expiration: Duration,
    pub refresh_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        access_token_expiration: Duration,
        refresh_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            access_token_expiration,
            refresh_token_expiration,
        }
    }
}

impl From<&crate::config::AppConfig> for AuthConfig {
    fn from(cfg: &crate::config::AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.access_token_ttl(),
            cfg.refresh_token_ttl(),
        )
    }
}

/// Token pair issued on signup, login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
}

/// Issues and validates session tokens
#[derive(Debug, Clone)]
pub struct AuthService {
    config: AuthConfig,
    db: Arc<DatabaseConnection>,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    fn claims_for(
        &self,
        user: &user::Model,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<Claims, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(ttl)
                .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;

        Ok(Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            kind,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        })
    }

    /// Generate an access/refresh token pair for a user
    pub fn generate_token(&self, user: &user::Model) -> Result<TokenPair, AuthError> {
        let access_claims = self.claims_for(
            user,
            TokenKind::Access,
            self.config.access_token_expiration,
        )?;
        let refresh_claims = self.claims_for(
            user,
            TokenKind::Refresh,
            self.config.refresh_token_expiration,
        )?;

        Ok(TokenPair {
            access_token: self.sign(&access_claims)?,
            refresh_token: self.sign(&refresh_claims)?,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
            refresh_expires_in: self.config.refresh_token_expiration.as_secs() as i64,
        })
    }

    /// Validate a JWT's signature and expiry and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Loads the account named by the claims; unknown and inactive accounts are rejected.
    async fn active_user(&self, claims: &Claims) -> Result<user::Model, AuthError> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        match User::find_by_id(user_id).one(&*self.db).await? {
            Some(user) if user.is_active => Ok(user),
            _ => {
                debug!(user_id = %user_id, "token presented for inactive or missing account");
                Err(AuthError::InactiveAccount)
            }
        }
    }

    /// Resolves an access token into the caller's principal.
    pub async fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.validate_token(token)?;
        if claims.kind != TokenKind::Access {
            return Err(AuthError::WrongTokenKind);
        }

        let user = self.active_user(&claims).await?;
        Ok(Principal::from(&user))
    }

    /// Exchange a refresh token for a fresh pair
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<(user::Model, TokenPair), AuthError> {
        let claims = self.validate_token(refresh_token)?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::WrongTokenKind);
        }

        let user = self.active_user(&claims).await?;
        let tokens = self.generate_token(&user)?;
        Ok((user, tokens))
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("No authentication token provided")]
    MissingToken,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Wrong token type")]
    WrongTokenKind,

    #[error("Account inactive or not found")]
    InactiveAccount,

    #[error("Insufficient permissions")]
    InsufficientRole,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Authentication unavailable: {0}")]
    Misconfigured(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InsufficientRole => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(msg) => ServiceError::TokenError(msg),
            AuthError::Hashing(msg) => ServiceError::HashError(msg),
            AuthError::Misconfigured(msg) => ServiceError::InternalError(msg),
            AuthError::Database(e) => ServiceError::DatabaseError(e),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware that validates the bearer token and attaches the principal
pub async fn auth_middleware(mut request: Request, next: Next) -> Result<Response, AuthError> {
    let auth_service = request
        .extensions()
        .get::<Arc<AuthService>>()
        .cloned()
        .ok_or_else(|| AuthError::Misconfigured("auth service not installed".to_string()))?;

    let token = bearer_token(request.headers()).ok_or(AuthError::MissingToken)?;
    let principal = auth_service.authenticate(token).await.map_err(|e| {
        warn!(error = %e, "rejected bearer token");
        e
    })?;

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Role middleware to check if the principal has exactly the required role
pub async fn role_middleware(
    State(required_role): State<UserRole>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .ok_or(AuthError::MissingToken)?;

    if !principal.has_role(required_role) {
        return Err(AuthError::InsufficientRole);
    }

    Ok(next.run(request).await)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_role(self, role: UserRole) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.route_layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_role(self, role: UserRole) -> Self {
        self.route_layer(axum::middleware::from_fn_with_state(role, role_middleware))
            .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SECRET: &str = "Vq7mL2xR9tKp4Wn8Zc3Hy6Jd1Fs5Gb0Q";

    fn service() -> AuthService {
        AuthService::new(
            AuthConfig::new(
                SECRET.to_string(),
                Duration::from_secs(24 * 60 * 60),
                Duration::from_secs(7 * 24 * 60 * 60),
            ),
            Arc::new(DatabaseConnection::Disconnected),
        )
    }

    fn user() -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            password_hash: String::new(),
            role: UserRole::Delivery,
            is_active: true,
            address: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn issued_tokens_carry_identity_and_kind() {
        let auth = service();
        let user = user();
        let pair = auth.generate_token(&user).unwrap();

        let access = auth.validate_token(&pair.access_token).unwrap();
        assert_eq!(access.sub, user.id.to_string());
        assert_eq!(access.email, "ada@example.com");
        assert_eq!(access.role, UserRole::Delivery);
        assert_eq!(access.kind, TokenKind::Access);
        assert_eq!(access.exp - access.iat, 24 * 60 * 60);

        let refresh = auth.validate_token(&pair.refresh_token).unwrap();
        assert_eq!(refresh.kind, TokenKind::Refresh);
        assert_eq!(refresh.exp - refresh.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let auth = service();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "late@example.com".into(),
            role: UserRole::Customer,
            kind: TokenKind::Access,
            jti: Uuid::new_v4().to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = auth.sign(&claims).unwrap();

        assert_matches!(auth.validate_token(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let auth = service();
        let other = AuthService::new(
            AuthConfig::new(
                "Xk4pN8wQ2zR6tY1uI5oP9aS3dF7gH0jL".to_string(),
                Duration::from_secs(60),
                Duration::from_secs(120),
            ),
            Arc::new(DatabaseConnection::Disconnected),
        );
        let pair = other.generate_token(&user()).unwrap();

        assert_matches!(
            auth.validate_token(&pair.access_token),
            Err(AuthError::InvalidToken)
        );
        assert_matches!(auth.validate_token("garbage"), Err(AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn refresh_token_cannot_authenticate_requests() {
        let auth = service();
        let pair = auth.generate_token(&user()).unwrap();

        assert_matches!(
            auth.authenticate(&pair.refresh_token).await,
            Err(AuthError::WrongTokenKind)
        );
        assert_matches!(
            auth.refresh_token(&pair.access_token).await,
            Err(AuthError::WrongTokenKind)
        );
    }

    #[test]
    fn auth_errors_map_to_service_errors() {
        assert_matches!(
            ServiceError::from(AuthError::InsufficientRole),
            ServiceError::Forbidden(_)
        );
        assert_matches!(
            ServiceError::from(AuthError::TokenExpired),
            ServiceError::Unauthorized(_)
        );
        assert_matches!(
            ServiceError::from(AuthError::Hashing("x".into())),
            ServiceError::HashError(_)
        );
    }

    #[test]
    fn bearer_token_requires_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}
