//! User entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{PackType, UserRole, UserStatus};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for user_status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "user_status", rename_all = "lowercase")]
pub enum UserStatusDb {
    Pending,
    Active,
    Rejected,
}

impl From<UserStatusDb> for UserStatus {
    fn from(db: UserStatusDb) -> Self {
        match db {
            UserStatusDb::Pending => UserStatus::Pending,
            UserStatusDb::Active => UserStatus::Active,
            UserStatusDb::Rejected => UserStatus::Rejected,
        }
    }
}

impl From<UserStatus> for UserStatusDb {
    fn from(status: UserStatus) -> Self {
        match status {
            UserStatus::Pending => UserStatusDb::Pending,
            UserStatus::Active => UserStatusDb::Active,
            UserStatus::Rejected => UserStatusDb::Rejected,
        }
    }
}

/// Database enum for pack_type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "pack_type", rename_all = "lowercase")]
pub enum PackTypeDb {
    Starter,
    Gold,
}

impl From<PackTypeDb> for PackType {
    fn from(db: PackTypeDb) -> Self {
        match db {
            PackTypeDb::Starter => PackType::Starter,
            PackTypeDb::Gold => PackType::Gold,
        }
    }
}

impl From<PackType> for PackTypeDb {
    fn from(pack: PackType) -> Self {
        match pack {
            PackType::Starter => PackTypeDb::Starter,
            PackType::Gold => PackTypeDb::Gold,
        }
    }
}

/// Database enum for user_role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum UserRoleDb {
    User,
    Admin,
}

impl From<UserRoleDb> for UserRole {
    fn from(db: UserRoleDb) -> Self {
        match db {
            UserRoleDb::User => UserRole::User,
            UserRoleDb::Admin => UserRole::Admin,
        }
    }
}

impl From<UserRole> for UserRoleDb {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::User => UserRoleDb::User,
            UserRole::Admin => UserRoleDb::Admin,
        }
    }
}

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub contact: Option<String>,
    pub role: UserRoleDb,
    pub status: UserStatusDb,
    pub current_level: i32,
    pub pack_type: Option<PackTypeDb>,
    pub invite_code: Option<String>,
    pub referred_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserEntity {
    pub fn is_active(&self) -> bool {
        self.status == UserStatusDb::Active
    }
}

impl From<UserEntity> for domain::models::User {
    fn from(entity: UserEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            email: entity.email,
            password_hash: entity.password_hash,
            contact: entity.contact,
            role: entity.role.into(),
            status: entity.status.into(),
            current_level: entity.current_level,
            pack_type: entity.pack_type.map(Into::into),
            invite_code: entity.invite_code,
            referred_by: entity.referred_by,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_conversion_both_ways() {
        for status in [UserStatus::Pending, UserStatus::Active, UserStatus::Rejected] {
            let db: UserStatusDb = status.into();
            assert_eq!(UserStatus::from(db), status);
        }
    }

    #[test]
    fn test_entity_into_domain() {
        let now = Utc::now();
        let entity = UserEntity {
            id: Uuid::new_v4(),
            name: "Ama".to_string(),
            email: "ama@example.com".to_string(),
            password_hash: "hash".to_string(),
            contact: None,
            role: UserRoleDb::Admin,
            status: UserStatusDb::Active,
            current_level: 2,
            pack_type: Some(PackTypeDb::Gold),
            invite_code: Some("ABC234".to_string()),
            referred_by: None,
            created_at: now,
            updated_at: now,
        };
        assert!(entity.is_active());

        let user: domain::models::User = entity.into();
        assert_eq!(user.role, UserRole::Admin);
        assert_eq!(user.pack_type, Some(PackType::Gold));
        assert_eq!(user.current_level, 2);
    }
}
