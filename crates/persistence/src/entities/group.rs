//! Group entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::group::{GroupMember, GroupPreview, GroupWithCounts};
use domain::services::progression::{is_group_full, registration_has_room, OwnedGroupProgress};
use sqlx::FromRow;
use uuid::Uuid;

use super::user::UserStatusDb;

/// Database row mapping for the groups table.
#[derive(Debug, Clone, FromRow)]
pub struct GroupEntity {
    pub id: Uuid,
    pub code: String,
    pub owner_id: Uuid,
    pub group_number: i32,
    pub created_at: DateTime<Utc>,
}

impl From<GroupEntity> for domain::models::Group {
    fn from(entity: GroupEntity) -> Self {
        Self {
            id: entity.id,
            code: entity.code,
            owner_id: entity.owner_id,
            group_number: entity.group_number,
            created_at: entity.created_at,
        }
    }
}

/// Group row with invite and verified member counts.
#[derive(Debug, Clone, FromRow)]
pub struct GroupWithCountsEntity {
    pub id: Uuid,
    pub code: String,
    pub owner_id: Uuid,
    pub group_number: i32,
    pub created_at: DateTime<Utc>,
    pub members: i64,
    pub verified_members: i64,
}

impl From<GroupWithCountsEntity> for GroupWithCounts {
    fn from(entity: GroupWithCountsEntity) -> Self {
        Self {
            group: domain::models::Group {
                id: entity.id,
                code: entity.code,
                owner_id: entity.owner_id,
                group_number: entity.group_number,
                created_at: entity.created_at,
            },
            members: entity.members,
            verified_members: entity.verified_members,
            is_full: is_group_full(entity.verified_members),
        }
    }
}

/// Group number and verified count of one owned group.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct OwnedGroupCountEntity {
    pub id: Uuid,
    pub group_number: i32,
    pub verified_members: i64,
}

impl From<OwnedGroupCountEntity> for OwnedGroupProgress {
    fn from(entity: OwnedGroupCountEntity) -> Self {
        OwnedGroupProgress::new(entity.group_number, entity.verified_members)
    }
}

/// Owned group of an active user, used by the missing-next-group sweep.
#[derive(Debug, Clone, FromRow)]
pub struct OwnerGroupProgressEntity {
    pub owner_id: Uuid,
    pub owner_name: String,
    pub owner_email: String,
    pub group_number: i32,
    pub verified_members: i64,
}

/// Member row joined from invites and users.
#[derive(Debug, Clone, FromRow)]
pub struct GroupMemberEntity {
    pub invite_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub contact: Option<String>,
    pub status: UserStatusDb,
    pub owner_confirmed: bool,
    pub joined_at: DateTime<Utc>,
}

impl From<GroupMemberEntity> for GroupMember {
    fn from(entity: GroupMemberEntity) -> Self {
        Self {
            invite_id: entity.invite_id,
            user_id: entity.user_id,
            name: entity.name,
            email: entity.email,
            contact: entity.contact,
            status: entity.status.into(),
            owner_confirmed: entity.owner_confirmed,
            joined_at: entity.joined_at,
        }
    }
}

/// Public group lookup with the registration gate count.
#[derive(Debug, Clone, FromRow)]
pub struct GroupPreviewEntity {
    pub code: String,
    pub group_number: i32,
    pub owner_name: String,
    pub verified_members: i64,
    pub registered_with_code: i64,
}

impl From<GroupPreviewEntity> for GroupPreview {
    fn from(entity: GroupPreviewEntity) -> Self {
        Self {
            registration_open: entity.group_number == 1
                && registration_has_room(entity.registered_with_code),
            code: entity.code,
            group_number: entity.group_number,
            owner_name: entity.owner_name,
            verified_members: entity.verified_members,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preview(group_number: i32, registered_with_code: i64) -> GroupPreview {
        GroupPreviewEntity {
            code: "ABC234".to_string(),
            group_number,
            owner_name: "Owner".to_string(),
            verified_members: 0,
            registered_with_code,
        }
        .into()
    }

    #[test]
    fn test_preview_registration_open() {
        assert!(preview(1, 0).registration_open);
        assert!(preview(1, 3).registration_open);
        assert!(!preview(1, 4).registration_open);
    }

    #[test]
    fn test_preview_closed_above_level_one() {
        assert!(!preview(2, 0).registration_open);
    }

    #[test]
    fn test_counts_entity_marks_full() {
        let entity = GroupWithCountsEntity {
            id: Uuid::new_v4(),
            code: "ABC234".to_string(),
            owner_id: Uuid::new_v4(),
            group_number: 1,
            created_at: Utc::now(),
            members: 6,
            verified_members: 4,
        };
        let group: GroupWithCounts = entity.into();
        assert!(group.is_full);
        assert_eq!(group.members, 6);
    }
}
