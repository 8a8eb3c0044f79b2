//! Invite domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A referred user's membership slot in a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Invite {
    pub id: Uuid,
    pub group_id: Uuid,
    /// Always the owner of `group_id`.
    pub inviter_id: Uuid,
    pub referred_user_id: Uuid,
    pub owner_confirmed: bool,
    pub created_at: DateTime<Utc>,
}
