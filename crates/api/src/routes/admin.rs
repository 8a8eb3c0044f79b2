//! Admin routes: verification queue, status changes and progression repair.

use axum::{
    extract::{Path, State},
    Json,
};
use domain::models::group::{GroupCreationResponse, MissingNextGroupCandidate, RepairReport};
use domain::models::user::{PendingUsersResponse, UpdateStatusRequest};
use domain::models::User;
use persistence::repositories::UserRepository;
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AdminAuth;
use crate::services::ProgressionService;

/// Users waiting for verification, newest first.
///
/// GET /api/v1/admin/users/pending
pub async fn list_pending_users(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> Result<Json<PendingUsersResponse>, ApiError> {
    let data = UserRepository::new(state.pool.clone())
        .list_pending()
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(PendingUsersResponse { data }))
}

/// Set a user's status. Activation may create groups and raise levels.
///
/// PUT /api/v1/admin/users/:user_id/status
pub async fn update_user_status(
    State(state): State<AppState>,
    AdminAuth(admin): AdminAuth,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<User>, ApiError> {
    let user = ProgressionService::new(state.pool.clone())
        .update_user_status(user_id, request.status)
        .await?;

    info!(
        admin_id = %admin.user_id,
        user_id = %user_id,
        status = %request.status,
        "Admin changed user status"
    );
    Ok(Json(user.into()))
}

/// Run the next-group check for one user.
///
/// POST /api/v1/admin/users/:user_id/advance
pub async fn advance_user(
    State(state): State<AppState>,
    AdminAuth(admin): AdminAuth,
    Path(user_id): Path<Uuid>,
) -> Result<Json<GroupCreationResponse>, ApiError> {
    let response = ProgressionService::new(state.pool.clone())
        .advance_if_eligible(user_id)
        .await?;

    info!(
        admin_id = %admin.user_id,
        user_id = %user_id,
        created = response.created,
        "Admin advance"
    );
    Ok(Json(response))
}

/// Active users whose highest group is full but who lack the next group.
///
/// GET /api/v1/admin/missing-next-group
pub async fn find_missing_next_group(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> Result<Json<Vec<MissingNextGroupCandidate>>, ApiError> {
    let candidates = ProgressionService::new(state.pool.clone())
        .find_users_missing_next_group()
        .await?;

    Ok(Json(candidates))
}

/// Advance every flagged user.
///
/// POST /api/v1/admin/missing-next-group/repair
pub async fn repair_missing_next_group(
    State(state): State<AppState>,
    AdminAuth(admin): AdminAuth,
) -> Result<Json<RepairReport>, ApiError> {
    let report = ProgressionService::new(state.pool.clone())
        .repair_missing_next_groups()
        .await?;

    info!(admin_id = %admin.user_id, created = report.created.len(), "Admin repair run");
    Ok(Json(report))
}
