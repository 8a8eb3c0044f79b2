//! Registration and login routes.

use axum::{extract::State, http::StatusCode, Json};
use domain::models::user::{AuthResponse, LoginRequest, RegisterRequest};
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::AuthService;

/// Register a new user, optionally with a level-1 group code.
///
/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    request.validate()?;

    let response = AuthService::new(state.pool.clone(), state.jwt.clone())
        .register(&request)
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Log in with email and password.
///
/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    request.validate()?;

    let response = AuthService::new(state.pool.clone(), state.jwt.clone())
        .login(&request)
        .await?;

    Ok(Json(response))
}
