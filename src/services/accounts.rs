use crate::{
    auth::{
        password::{hash_password_blocking, verify_password_blocking},
        AuthError, AuthResponse, AuthService, ChangePasswordRequest, LoginRequest, ProfileUpdate,
        SignupRequest, UserResponse,
    },
    db::StoreHandle,
    entities::{user, User, UserRole},
    errors::ServiceError,
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn invalid_credentials() -> ServiceError {
    counter!("storefront.auth.login_failed", 1);
    ServiceError::from(AuthError::InvalidCredentials)
}

fn user_not_found() -> ServiceError {
    ServiceError::NotFound("User not found".to_string())
}

fn duplicate_email(err: DbErr) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            ServiceError::Conflict("User already exists".to_string())
        }
        _ => ServiceError::DatabaseError(err),
    }
}

/// Account lifecycle: signup, login, profile and administration.
#[derive(Clone)]
pub struct AccountService {
    db: StoreHandle,
    auth: Arc<AuthService>,
}

impl AccountService {
    pub fn new(db: StoreHandle, auth: Arc<AuthService>) -> Self {
        Self { db, auth }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(User::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await?)
    }

    async fn find(&self, id: Uuid) -> Result<user::Model, ServiceError> {
        User::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(user_not_found)
    }

    /// Creates a customer account and signs it in.
    #[instrument(skip(self, request))]
    pub async fn signup(&self, request: SignupRequest) -> Result<AuthResponse, ServiceError> {
        self.register(request, UserRole::Customer)
            .await
            .and_then(|user| self.issue(user))
    }

    /// Creates an active account with the given role. Signup always passes `Customer`.
    #[instrument(skip(self, request), fields(role = %role))]
    pub async fn register(
        &self,
        request: SignupRequest,
        role: UserRole,
    ) -> Result<user::Model, ServiceError> {
        request.validate()?;

        let email = normalize_email(&request.email);
        if self.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict("User already exists".to_string()));
        }

        let password_hash = hash_password_blocking(request.password).await?;
        let now = Utc::now();
        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            password_hash: Set(password_hash),
            role: Set(role),
            is_active: Set(true),
            address: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(duplicate_email)?;

        info!(user_id = %user.id, role = %user.role, "Account created");
        Ok(user)
    }

    fn issue(&self, user: user::Model) -> Result<AuthResponse, ServiceError> {
        let tokens = self.auth.generate_token(&user)?;
        Ok(AuthResponse::new(user, tokens))
    }

    /// Unknown email, inactive account and wrong password all yield the same error.
    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, ServiceError> {
        request.validate()?;

        let email = normalize_email(&request.email);
        let user = match self.find_by_email(&email).await? {
            Some(user) if user.is_active => user,
            Some(user) => {
                warn!(user_id = %user.id, "login attempt on inactive account");
                return Err(invalid_credentials());
            }
            None => return Err(invalid_credentials()),
        };

        if !verify_password_blocking(request.password, user.password_hash.clone()).await? {
            return Err(invalid_credentials());
        }

        info!(user_id = %user.id, "User logged in");
        self.issue(user)
    }

    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, ServiceError> {
        let (user, tokens) = self.auth.refresh_token(refresh_token).await?;
        Ok(AuthResponse::new(user, tokens))
    }

    #[instrument(skip(self))]
    pub async fn profile(&self, user_id: Uuid) -> Result<UserResponse, ServiceError> {
        self.find(user_id).await.map(UserResponse::from)
    }

    /// Applies the allow-listed profile fields. Role, status and password are untouched.
    #[instrument(skip(self, update))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<UserResponse, ServiceError> {
        update.validate()?;

        let existing = self.find(user_id).await?;
        let mut active: user::ActiveModel = existing.clone().into();

        if let Some(email) = update.email.as_deref().map(normalize_email) {
            if email != existing.email {
                if self.find_by_email(&email).await?.is_some() {
                    return Err(ServiceError::Conflict("email already in use".to_string()));
                }
                active.email = Set(email);
            }
        }
        if let Some(address) = update.address {
            active.address = Set(Some(address));
        }
        active.updated_at = Set(Utc::now());

        let user = active.update(&*self.db).await.map_err(duplicate_email)?;
        info!(user_id = %user_id, "Profile updated");
        Ok(user.into())
    }

    #[instrument(skip(self, request))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), ServiceError> {
        request.validate()?;

        let user = self.find(user_id).await?;
        if !verify_password_blocking(request.current_password, user.password_hash.clone()).await? {
            return Err(ServiceError::InvalidInput(
                "Current password is incorrect".to_string(),
            ));
        }

        let password_hash = hash_password_blocking(request.new_password).await?;
        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(password_hash);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<UserResponse>, ServiceError> {
        let mut query = User::find().order_by_asc(user::Column::CreatedAt);
        if let Some(role) = role {
            query = query.filter(user::Column::Role.eq(role));
        }

        let users = query.all(&*self.db).await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: Uuid) -> Result<UserResponse, ServiceError> {
        self.profile(user_id).await
    }

    /// Blocks or unblocks an account. Takes effect on the account's next request.
    #[instrument(skip(self))]
    pub async fn set_active(&self, user_id: Uuid, active: bool) -> Result<UserResponse, ServiceError> {
        let user = self.find(user_id).await?;
        let mut model: user::ActiveModel = user.into();
        model.is_active = Set(active);
        model.updated_at = Set(Utc::now());

        let user = model.update(&*self.db).await?;
        info!(user_id = %user_id, active, "Account status changed");
        Ok(user.into())
    }
}
