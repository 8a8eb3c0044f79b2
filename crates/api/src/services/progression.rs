//! Group progression engine.
//!
//! Admission into groups, owner confirmation, first/next group creation and
//! the missing-next-group repair sweep. Every public operation runs in one
//! transaction; users whose level or groups may change are row-locked first.

use domain::models::group::{
    generate_group_code, ConfirmMemberResponse, GroupCreationResponse, MissingNextGroupCandidate,
    RepairReport,
};
use domain::models::user::{RegisterRequest, UserStatus};
use domain::services::progression::{
    evaluate_advancement, is_group_full, level_after_full_group, recompute_level,
    registration_has_room, AdvancementDecision, OwnedGroupProgress, REGISTRATION_GROUP_NUMBER,
};
use persistence::entities::{GroupEntity, UserEntity, UserRoleDb, UserStatusDb};
use persistence::repositories::{GroupRepository, InviteRepository, NewUser, UserRepository};
use shared::password::{hash_password, PasswordError};
use shared::validation::normalize_group_code;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::metrics::{
    record_group_created, record_level_advanced, record_member_confirmed, record_registration,
};

const UQ_USERS_EMAIL: &str = "uq_users_email";
const UQ_INVITES_GROUP_REFERRED: &str = "uq_invites_group_referred";

/// Errors raised by progression operations.
#[derive(Debug, Error)]
pub enum ProgressionError {
    #[error("Invalid invite code.")]
    InvalidInviteCode,

    #[error("This group is level {required}, but the user is at level {current}.")]
    LevelMismatch { required: i32, current: i32 },

    #[error("This group is full.")]
    GroupFull,

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("User already belongs to this group")]
    DuplicateInvite,

    #[error("User not found")]
    UserNotFound,

    #[error("Group not found")]
    GroupNotFound,

    #[error("Invite not found")]
    InviteNotFound,

    #[error("Only the group owner can confirm its members")]
    NotGroupOwner,

    #[error("{0}")]
    Validation(String),

    #[error("Password error: {0}")]
    Password(#[from] PasswordError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<ProgressionError> for ApiError {
    fn from(err: ProgressionError) -> Self {
        match err {
            ProgressionError::InvalidInviteCode => ApiError::InvalidInviteCode(err.to_string()),
            ProgressionError::LevelMismatch { .. } => ApiError::Precondition {
                code: "level_mismatch",
                message: err.to_string(),
            },
            ProgressionError::GroupFull => ApiError::Precondition {
                code: "group_full",
                message: err.to_string(),
            },
            ProgressionError::DuplicateEmail | ProgressionError::DuplicateInvite => {
                ApiError::Conflict(err.to_string())
            }
            ProgressionError::UserNotFound
            | ProgressionError::GroupNotFound
            | ProgressionError::InviteNotFound => ApiError::NotFound(err.to_string()),
            ProgressionError::NotGroupOwner => ApiError::Forbidden(err.to_string()),
            ProgressionError::Validation(msg) => ApiError::validation(msg),
            ProgressionError::Password(e) => ApiError::Internal(e.to_string()),
            ProgressionError::Database(e) => e.into(),
        }
    }
}

fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

/// Who is confirming a member.
#[derive(Debug, Clone, Copy)]
pub struct Confirmer {
    pub user_id: Uuid,
    pub is_admin: bool,
}

/// Group progression engine over users, groups and invites.
#[derive(Clone)]
pub struct ProgressionService {
    pool: PgPool,
}

impl ProgressionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Registers a pending user, optionally inside a level-1 group.
    ///
    /// The group gate here counts non-rejected users registered with the
    /// code, before any of them is verified.
    pub async fn register_with_invite(
        &self,
        req: &RegisterRequest,
    ) -> Result<UserEntity, ProgressionError> {
        let password_hash = hash_password(&req.password)?;
        let email = req.email.trim().to_lowercase();
        let code = req
            .invite_code
            .as_deref()
            .map(normalize_group_code)
            .filter(|c| !c.is_empty());

        let mut tx = self.pool.begin().await?;

        let group = match code {
            Some(code) => {
                let group = GroupRepository::find_by_code_for_update(&mut *tx, &code)
                    .await?
                    .ok_or(ProgressionError::InvalidInviteCode)?;

                if group.group_number != REGISTRATION_GROUP_NUMBER {
                    return Err(ProgressionError::LevelMismatch {
                        required: group.group_number,
                        current: REGISTRATION_GROUP_NUMBER,
                    });
                }

                let registered =
                    UserRepository::count_registrations_by_code(&mut *tx, &group.code).await?;
                if !registration_has_room(registered) {
                    return Err(ProgressionError::GroupFull);
                }
                Some(group)
            }
            None => None,
        };

        let new_user = NewUser {
            name: req.name.trim(),
            email: &email,
            password_hash: &password_hash,
            contact: req.contact.as_deref(),
            role: UserRoleDb::User,
            status: UserStatusDb::Pending,
            invite_code: group.as_ref().map(|g| g.code.as_str()),
            referred_by: group.as_ref().map(|g| g.owner_id),
        };
        let user = UserRepository::insert(&mut *tx, &new_user)
            .await
            .map_err(|e| {
                if is_unique_violation(&e, UQ_USERS_EMAIL) {
                    ProgressionError::DuplicateEmail
                } else {
                    e.into()
                }
            })?;

        if let Some(group) = &group {
            InviteRepository::insert_if_absent(&mut *tx, group.id, group.owner_id, user.id)
                .await?
                .ok_or(ProgressionError::DuplicateInvite)?;
        }

        tx.commit().await?;

        record_registration();
        info!(
            user_id = %user.id,
            group_id = ?group.as_ref().map(|g| g.id),
            "User registered"
        );

        Ok(user)
    }

    /// Adds a user to another owner's group at the user's current level.
    ///
    /// Leaves `invite_code` and `referred_by` untouched.
    pub async fn join_existing_group(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<domain::models::Invite, ProgressionError> {
        let code = normalize_group_code(code);
        let mut tx = self.pool.begin().await?;

        let user = UserRepository::lock_for_update(&mut *tx, user_id)
            .await?
            .ok_or(ProgressionError::UserNotFound)?;

        let group = GroupRepository::find_by_code_for_update(&mut *tx, &code)
            .await?
            .ok_or(ProgressionError::GroupNotFound)?;

        if group.owner_id == user.id {
            return Err(ProgressionError::Validation(
                "You cannot join your own group".to_string(),
            ));
        }

        if user.current_level != group.group_number {
            return Err(ProgressionError::LevelMismatch {
                required: group.group_number,
                current: user.current_level,
            });
        }

        let verified = GroupRepository::count_verified(&mut *tx, group.id).await?;
        if is_group_full(verified) {
            return Err(ProgressionError::GroupFull);
        }

        let invite = InviteRepository::insert_if_absent(&mut *tx, group.id, group.owner_id, user.id)
            .await
            .map_err(|e| {
                if is_unique_violation(&e, UQ_INVITES_GROUP_REFERRED) {
                    ProgressionError::DuplicateInvite
                } else {
                    e.into()
                }
            })?
            .ok_or(ProgressionError::DuplicateInvite)?;

        tx.commit().await?;

        info!(
            user_id = %user.id,
            group_id = %group.id,
            group_number = group.group_number,
            "User joined group"
        );

        Ok(invite.into())
    }

    /// Marks an invite as owner-confirmed and propagates the consequences.
    ///
    /// Confirming into a level-1 group may give the member their own first
    /// group; confirming into a higher group may advance the member's chain.
    /// The owner is then advanced and has their level recomputed.
    pub async fn confirm_member(
        &self,
        invite_id: Uuid,
        confirmer: Confirmer,
    ) -> Result<ConfirmMemberResponse, ProgressionError> {
        let mut tx = self.pool.begin().await?;

        let invite = InviteRepository::find_by_id(&mut *tx, invite_id)
            .await?
            .ok_or(ProgressionError::InviteNotFound)?;

        let group = GroupRepository::find_by_id_in(&mut *tx, invite.group_id)
            .await?
            .ok_or(ProgressionError::GroupNotFound)?;

        if group.owner_id != confirmer.user_id && !confirmer.is_admin {
            return Err(ProgressionError::NotGroupOwner);
        }

        let invite = InviteRepository::confirm(&mut *tx, invite_id)
            .await?
            .ok_or(ProgressionError::InviteNotFound)?;

        let mut ids = vec![invite.referred_user_id, group.owner_id];
        ids.sort();
        ids.dedup();
        UserRepository::lock_many(&mut *tx, &ids).await?;

        let member = if group.group_number == REGISTRATION_GROUP_NUMBER {
            ensure_first_group_in(&mut *tx, invite.referred_user_id).await?
        } else {
            advance_in(&mut *tx, invite.referred_user_id).await?
        };

        let owner = refresh_owner_in(&mut *tx, group.owner_id).await?;

        tx.commit().await?;

        record_member_confirmed();
        info!(
            invite_id = %invite.id,
            group_id = %group.id,
            member_id = %invite.referred_user_id,
            confirmed_by = %confirmer.user_id,
            "Member confirmed"
        );

        Ok(ConfirmMemberResponse {
            invite: invite.into(),
            member_group_created: member.created,
            owner_group_created: owner.created,
            owner_level: owner.current_level,
        })
    }

    /// Creates the user's level-1 group when they are active, confirmed by
    /// their inviter and own no group yet. Always recomputes the level.
    pub async fn ensure_first_group(
        &self,
        user_id: Uuid,
    ) -> Result<GroupCreationResponse, ProgressionError> {
        let mut tx = self.pool.begin().await?;
        let outcome = ensure_first_group_in(&mut *tx, user_id).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Creates the user's next group when their highest group is full and
    /// they hold a confirmed invite at the next level.
    pub async fn advance_if_eligible(
        &self,
        user_id: Uuid,
    ) -> Result<GroupCreationResponse, ProgressionError> {
        let mut tx = self.pool.begin().await?;
        let outcome = advance_in(&mut *tx, user_id).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Active users whose highest group is full but who lack the next one.
    pub async fn find_users_missing_next_group(
        &self,
    ) -> Result<Vec<MissingNextGroupCandidate>, ProgressionError> {
        let rows = GroupRepository::new(self.pool.clone())
            .list_active_owner_progress()
            .await?;

        let mut candidates = Vec::new();
        // Rows arrive grouped by owner
        for owner_rows in rows.chunk_by(|a, b| a.owner_id == b.owner_id) {
            let progress: Vec<OwnedGroupProgress> = owner_rows
                .iter()
                .map(|r| OwnedGroupProgress::new(r.group_number, r.verified_members))
                .collect();

            if let AdvancementDecision::Eligible {
                last_group_number,
                verified_members,
                ..
            } = evaluate_advancement(&progress)
            {
                let owner = &owner_rows[0];
                candidates.push(MissingNextGroupCandidate {
                    user_id: owner.owner_id,
                    name: owner.owner_name.clone(),
                    email: owner.owner_email.clone(),
                    last_group_number,
                    verified_count: verified_members,
                });
            }
        }

        Ok(candidates)
    }

    /// Runs [`Self::advance_if_eligible`] for every flagged user.
    pub async fn repair_missing_next_groups(&self) -> Result<RepairReport, ProgressionError> {
        let candidates = self.find_users_missing_next_group().await?;
        let mut report = RepairReport {
            checked: candidates.len(),
            ..Default::default()
        };

        for candidate in candidates {
            if self.advance_if_eligible(candidate.user_id).await?.created {
                report.created.push(candidate.user_id);
            } else {
                report.blocked.push(candidate.user_id);
            }
        }

        info!(
            checked = report.checked,
            created = report.created.len(),
            blocked = report.blocked.len(),
            "Missing next group repair finished"
        );
        Ok(report)
    }

    /// Sets a user's verification status.
    ///
    /// Activation runs the first-group check for the user and refreshes every
    /// owner who has already confirmed them, since their verified counts grow.
    pub async fn update_user_status(
        &self,
        user_id: Uuid,
        status: UserStatus,
    ) -> Result<UserEntity, ProgressionError> {
        let (mut tx, owners) = self.lock_for_status_change(user_id, status).await?;

        let user = UserRepository::set_status(&mut *tx, user_id, status.into())
            .await?
            .ok_or(ProgressionError::UserNotFound)?;

        if status == UserStatus::Active {
            ensure_first_group_in(&mut *tx, user_id).await?;
            for owner_id in owners.into_iter().filter(|id| *id != user_id) {
                refresh_owner_in(&mut *tx, owner_id).await?;
            }
        }

        // Re-read so the returned level reflects the recompute above
        let user = UserRepository::lock_for_update(&mut *tx, user.id)
            .await?
            .ok_or(ProgressionError::UserNotFound)?;

        tx.commit().await?;

        info!(user_id = %user.id, status = %status, "User status updated");
        Ok(user)
    }

    /// Opens the status-change transaction holding the user's lock and, on
    /// activation, the locks of every owner who has confirmed them.
    ///
    /// The owner list is read under the user's lock, so a confirmation that
    /// committed while we waited is seen. Locks are taken in one id-ordered
    /// statement; if the list grew past what was locked, the transaction is
    /// rolled back and retried with the larger set.
    async fn lock_for_status_change(
        &self,
        user_id: Uuid,
        status: UserStatus,
    ) -> Result<(sqlx::Transaction<'static, sqlx::Postgres>, Vec<Uuid>), ProgressionError> {
        let mut locked = vec![user_id];

        loop {
            let mut tx = self.pool.begin().await?;
            UserRepository::lock_many(&mut *tx, &locked).await?;

            if status != UserStatus::Active {
                return Ok((tx, Vec::new()));
            }

            let owners = GroupRepository::owners_confirming(&mut *tx, user_id).await?;
            if owners.iter().all(|id| locked.contains(id)) {
                return Ok((tx, owners));
            }

            debug!(user_id = %user_id, "Confirming owners changed while locking, retrying");
            tx.rollback().await?;
            locked.extend(owners);
            locked.sort();
            locked.dedup();
        }
    }
}

/// Loads the user's owned groups with verified counts.
async fn owned_progress(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Vec<OwnedGroupProgress>, sqlx::Error> {
    Ok(GroupRepository::list_owned_counts(conn, user_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect())
}

/// Persists a higher level, if any, and records the advancement.
async fn apply_level(
    conn: &mut PgConnection,
    user: &UserEntity,
    new_level: i32,
) -> Result<i32, sqlx::Error> {
    if new_level > user.current_level && UserRepository::raise_level(conn, user.id, new_level).await?
    {
        record_level_advanced(new_level);
        info!(
            user_id = %user.id,
            from_level = user.current_level,
            to_level = new_level,
            "Level advanced"
        );
        return Ok(new_level);
    }
    Ok(user.current_level)
}

async fn create_group_in(
    conn: &mut PgConnection,
    owner_id: Uuid,
    group_number: i32,
) -> Result<Option<GroupEntity>, sqlx::Error> {
    let group =
        GroupRepository::create_with_unique_code(conn, owner_id, group_number, generate_group_code)
            .await?;

    match &group {
        Some(group) => {
            record_group_created(group_number);
            info!(
                owner_id = %owner_id,
                group_id = %group.id,
                group_number,
                code = %group.code,
                "Group created"
            );
        }
        None => debug!(owner_id = %owner_id, group_number, "Group already exists"),
    }
    Ok(group)
}

/// Recomputes a user's level from every group they own.
async fn recompute_level_in(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<i32, ProgressionError> {
    let user = UserRepository::lock_for_update(&mut *conn, user_id)
        .await?
        .ok_or(ProgressionError::UserNotFound)?;

    let owned = owned_progress(&mut *conn, user_id).await?;
    let level = recompute_level(user.current_level, &owned);
    Ok(apply_level(conn, &user, level).await?)
}

async fn ensure_first_group_in(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<GroupCreationResponse, ProgressionError> {
    let user = UserRepository::lock_for_update(&mut *conn, user_id)
        .await?
        .ok_or(ProgressionError::UserNotFound)?;

    let owns_none = owned_progress(&mut *conn, user_id).await?.is_empty();

    let created = if user.is_active()
        && owns_none
        && InviteRepository::has_confirmed_invite(&mut *conn, user_id).await?
    {
        create_group_in(&mut *conn, user_id, REGISTRATION_GROUP_NUMBER)
            .await?
            .is_some()
    } else {
        debug!(
            user_id = %user_id,
            active = user.is_active(),
            owns_none,
            "First group not created"
        );
        false
    };

    let current_level = recompute_level_in(conn, user_id).await?;
    Ok(GroupCreationResponse {
        created,
        current_level,
    })
}

async fn advance_in(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<GroupCreationResponse, ProgressionError> {
    let user = UserRepository::lock_for_update(&mut *conn, user_id)
        .await?
        .ok_or(ProgressionError::UserNotFound)?;

    let owned = owned_progress(&mut *conn, user_id).await?;

    let AdvancementDecision::Eligible {
        last_group_number,
        next_group_number,
        ..
    } = evaluate_advancement(&owned)
    else {
        debug!(user_id = %user_id, "Not eligible for next group");
        return Ok(GroupCreationResponse {
            created: false,
            current_level: user.current_level,
        });
    };

    // The level moves with fullness even if the group below is not created
    let bumped = level_after_full_group(user.current_level, last_group_number);
    let current_level = apply_level(&mut *conn, &user, bumped).await?;

    if !InviteRepository::has_confirmed_invite_at_level(&mut *conn, user_id, next_group_number)
        .await?
    {
        debug!(
            user_id = %user_id,
            next_group_number,
            "Next group blocked: no confirmed invite at that level"
        );
        return Ok(GroupCreationResponse {
            created: false,
            current_level,
        });
    }

    let created = create_group_in(conn, user_id, next_group_number)
        .await?
        .is_some();

    Ok(GroupCreationResponse {
        created,
        current_level,
    })
}

/// Advances a group owner and recomputes their level.
async fn refresh_owner_in(
    conn: &mut PgConnection,
    owner_id: Uuid,
) -> Result<GroupCreationResponse, ProgressionError> {
    let advanced = advance_in(&mut *conn, owner_id).await?;
    let current_level = recompute_level_in(conn, owner_id).await?;
    Ok(GroupCreationResponse {
        created: advanced.created,
        current_level,
    })
}
