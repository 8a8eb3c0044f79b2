//! Referral group domain models.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use shared::validation::{
    normalize_group_code, validate_group_code, GROUP_CODE_ALPHABET, GROUP_CODE_LENGTH,
};

use super::invite::Invite;
use super::user::UserStatus;

/// A capacity-4 referral group owned by one user at one level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Group {
    pub id: Uuid,
    pub code: String,
    pub owner_id: Uuid,
    pub group_number: i32,
    pub created_at: DateTime<Utc>,
}

/// Group with member counts, recomputed on every read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct GroupWithCounts {
    #[serde(flatten)]
    pub group: Group,
    /// Number of invites into the group, confirmed or not.
    pub members: i64,
    /// Invites that are owner-confirmed and whose user is active.
    pub verified_members: i64,
    pub is_full: bool,
}

/// One membership slot of a group, as seen by its owner.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct GroupMember {
    pub invite_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub contact: Option<String>,
    pub status: UserStatus,
    pub owner_confirmed: bool,
    pub joined_at: DateTime<Utc>,
}

/// Group with counts and its member list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct GroupDetails {
    #[serde(flatten)]
    pub group: GroupWithCounts,
    pub member_list: Vec<GroupMember>,
}

/// Public preview of a group shown before registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct GroupPreview {
    pub code: String,
    pub group_number: i32,
    pub owner_name: String,
    pub verified_members: i64,
    /// Whether the registration gate still admits new sign-ups.
    pub registration_open: bool,
}

/// Request to join a group at the caller's current level.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct JoinGroupRequest {
    #[validate(custom(function = "validate_code_input"))]
    pub code: String,
}

/// Request to confirm a pending member.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConfirmMemberRequest {
    pub invite_id: Uuid,
}

/// Result of a group creation attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct GroupCreationResponse {
    pub created: bool,
    pub current_level: i32,
}

/// Result of confirming a member.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ConfirmMemberResponse {
    pub invite: Invite,
    /// The confirmed member received a group of their own.
    pub member_group_created: bool,
    /// The group owner received their next group.
    pub owner_group_created: bool,
    pub owner_level: i32,
}

/// Active user whose last group is full but who has no next group yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct MissingNextGroupCandidate {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub last_group_number: i32,
    pub verified_count: i64,
}

/// Outcome of the admin repair sweep.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RepairReport {
    pub checked: usize,
    /// Users that received their next group.
    pub created: Vec<Uuid>,
    /// Users still waiting on a confirmation at the next level.
    pub blocked: Vec<Uuid>,
}

/// Validates a user-typed group code after normalisation.
pub fn validate_code_input(code: &str) -> Result<(), ValidationError> {
    validate_group_code(&normalize_group_code(code))
}

/// Generates a random group code from the unambiguous alphabet.
pub fn generate_group_code() -> String {
    let mut rng = rand::thread_rng();
    (0..GROUP_CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..GROUP_CODE_ALPHABET.len());
            GROUP_CODE_ALPHABET[idx] as char
        })
        .collect()
}
