//! Invite entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the invites table.
#[derive(Debug, Clone, FromRow)]
pub struct InviteEntity {
    pub id: Uuid,
    pub group_id: Uuid,
    pub inviter_id: Uuid,
    pub referred_user_id: Uuid,
    pub owner_confirmed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<InviteEntity> for domain::models::Invite {
    fn from(entity: InviteEntity) -> Self {
        Self {
            id: entity.id,
            group_id: entity.group_id,
            inviter_id: entity.inviter_id,
            referred_user_id: entity.referred_user_id,
            owner_confirmed: entity.owner_confirmed,
            created_at: entity.created_at,
        }
    }
}
