//! Group routes: lookup, membership and progression triggers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::group::{
    ConfirmMemberRequest, ConfirmMemberResponse, GroupCreationResponse, GroupDetails,
    GroupPreview, GroupWithCounts, JoinGroupRequest,
};
use domain::models::Invite;
use persistence::repositories::GroupRepository;
use shared::validation::normalize_group_code;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::services::{Confirmer, ProgressionService};

/// Public preview of a group for the registration page.
///
/// GET /api/v1/groups/code/:code
pub async fn get_group_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<GroupPreview>, ApiError> {
    let preview = GroupRepository::new(state.pool.clone())
        .preview_by_code(&normalize_group_code(&code))
        .await?
        .ok_or_else(|| ApiError::NotFound("Group not found".to_string()))?;

    Ok(Json(preview.into()))
}

/// A group with its member and verified counts.
///
/// GET /api/v1/groups/:group_id
pub async fn get_group(
    State(state): State<AppState>,
    _user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<GroupWithCounts>, ApiError> {
    let group = GroupRepository::new(state.pool.clone())
        .find_with_counts(group_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Group not found".to_string()))?;

    Ok(Json(group.into()))
}

/// Counts plus the member list, for the owner or an admin.
///
/// GET /api/v1/groups/:group_id/members
pub async fn list_group_members(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<GroupDetails>, ApiError> {
    let group_repo = GroupRepository::new(state.pool.clone());

    let group: GroupWithCounts = group_repo
        .find_with_counts(group_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Group not found".to_string()))?
        .into();

    if group.group.owner_id != user_auth.user_id && !user_auth.is_admin() {
        return Err(ApiError::Forbidden(
            "Only the group owner can list its members".to_string(),
        ));
    }

    let member_list = group_repo
        .list_members(group_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(GroupDetails { group, member_list }))
}

/// Join another owner's group at the caller's current level.
///
/// POST /api/v1/groups/join
pub async fn join_group(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<JoinGroupRequest>,
) -> Result<(StatusCode, Json<Invite>), ApiError> {
    request.validate()?;

    let invite = ProgressionService::new(state.pool.clone())
        .join_existing_group(user_auth.user_id, &request.code)
        .await?;

    Ok((StatusCode::CREATED, Json(invite)))
}

/// Confirm a pending member of one of the caller's groups.
///
/// POST /api/v1/groups/confirm-member
pub async fn confirm_member(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<ConfirmMemberRequest>,
) -> Result<Json<ConfirmMemberResponse>, ApiError> {
    let confirmer = Confirmer {
        user_id: user_auth.user_id,
        is_admin: user_auth.is_admin(),
    };

    let response = ProgressionService::new(state.pool.clone())
        .confirm_member(request.invite_id, confirmer)
        .await?;

    Ok(Json(response))
}

/// Create the caller's level-1 group if they qualify.
///
/// POST /api/v1/groups/first-group
pub async fn create_first_group(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Result<Json<GroupCreationResponse>, ApiError> {
    let response = ProgressionService::new(state.pool.clone())
        .ensure_first_group(user_auth.user_id)
        .await?;

    Ok(Json(response))
}

/// Create the caller's next group if their highest group is full.
///
/// POST /api/v1/groups/next-group
pub async fn create_next_group(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Result<Json<GroupCreationResponse>, ApiError> {
    let response = ProgressionService::new(state.pool.clone())
        .advance_if_eligible(user_auth.user_id)
        .await?;

    Ok(Json(response))
}
