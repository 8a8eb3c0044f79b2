//! User profile routes.

use axum::{
    extract::{Path, State},
    Json,
};
use domain::models::group::GroupWithCounts;
use domain::models::user::{SelectPackRequest, UpdateProfileRequest, UserWithGroups};
use domain::models::User;
use persistence::repositories::{GroupRepository, ProfileChanges, UserRepository};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

/// The caller's own account.
///
/// GET /api/v1/users/me
pub async fn get_current_user(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Result<Json<User>, ApiError> {
    let user = UserRepository::new(state.pool.clone())
        .find_by_id(user_auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user.into()))
}

/// A user with every group they own and live member counts.
///
/// GET /api/v1/users/:user_id/with-groups
pub async fn get_user_with_groups(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserWithGroups>, ApiError> {
    user_auth.ensure_self_or_admin(user_id)?;

    let user = UserRepository::new(state.pool.clone())
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let groups: Vec<GroupWithCounts> = GroupRepository::new(state.pool.clone())
        .list_owned_with_counts(user_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(UserWithGroups {
        user: user.into(),
        groups,
    }))
}

/// Pick the starter or gold pack.
///
/// PUT /api/v1/users/:user_id/plan
pub async fn select_pack(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(user_id): Path<Uuid>,
    Json(request): Json<SelectPackRequest>,
) -> Result<Json<User>, ApiError> {
    if user_auth.user_id != user_id {
        return Err(ApiError::Forbidden(
            "You can only choose your own pack".to_string(),
        ));
    }

    let user = UserRepository::new(state.pool.clone())
        .update_pack(user_id, request.pack_type.into())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    info!(user_id = %user_id, pack_type = request.pack_type.as_str(), "Pack selected");
    Ok(Json(user.into()))
}

/// Update name, email or contact.
///
/// PATCH /api/v1/users/:user_id
pub async fn update_profile(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<User>, ApiError> {
    if user_auth.user_id != user_id {
        return Err(ApiError::Forbidden(
            "You can only update your own profile".to_string(),
        ));
    }
    if request.is_empty() {
        return Err(ApiError::validation(
            "At least one of name, email or contact is required",
        ));
    }
    request.validate()?;

    let email = request.email.as_deref().map(|e| e.trim().to_lowercase());
    let changes = ProfileChanges {
        name: request.name.as_deref().map(str::trim),
        email: email.as_deref(),
        contact: request.contact.as_deref(),
    };

    let user = UserRepository::new(state.pool.clone())
        .update_profile(user_id, &changes)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => ApiError::Conflict("Email already registered".to_string()),
            other => other,
        })?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    info!(user_id = %user_id, "Profile updated");
    Ok(Json(user.into()))
}
