//! Registration and login on top of the progression engine.

use std::sync::Arc;

use domain::models::user::{AuthResponse, LoginRequest, RegisterRequest, TokenInfo};
use domain::models::User;
use persistence::entities::UserEntity;
use persistence::repositories::UserRepository;
use shared::jwt::{JwtConfig, JwtError};
use shared::password::{verify_password, PasswordError};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::services::progression::{ProgressionError, ProgressionService};

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Progression(#[from] ProgressionError),

    #[error("Token error: {0}")]
    Token(#[from] JwtError),

    #[error("Password error: {0}")]
    Password(#[from] PasswordError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid email or password".to_string())
            }
            AuthError::Progression(e) => e.into(),
            AuthError::Token(e) => ApiError::Internal(e.to_string()),
            AuthError::Password(e) => ApiError::Internal(e.to_string()),
            AuthError::Database(e) => e.into(),
        }
    }
}

/// Service for registration and login.
pub struct AuthService {
    pool: PgPool,
    jwt: Arc<JwtConfig>,
}

impl AuthService {
    pub fn new(pool: PgPool, jwt: Arc<JwtConfig>) -> Self {
        Self { pool, jwt }
    }

    /// Registers through the progression engine and issues a token.
    pub async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, AuthError> {
        let user = ProgressionService::new(self.pool.clone())
            .register_with_invite(req)
            .await?;
        self.respond_with_token(user)
    }

    /// Verifies the password and issues a token.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, AuthError> {
        let user = UserRepository::new(self.pool.clone())
            .find_by_email(req.email.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&req.password, &user.password_hash)? {
            warn!(user_id = %user.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = %user.id, "User logged in");
        self.respond_with_token(user)
    }

    fn respond_with_token(&self, user: UserEntity) -> Result<AuthResponse, AuthError> {
        let user: User = user.into();
        let issued = self.jwt.issue(user.id, user.role.as_str())?;

        Ok(AuthResponse {
            user,
            token: TokenInfo {
                access_token: issued.token,
                token_type: "Bearer".to_string(),
                expires_in: issued.expires_in,
            },
        })
    }
}
