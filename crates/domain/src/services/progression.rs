//! Group fullness and level advancement rules.
//!
//! Everything here is pure: callers load counts inside their transaction and
//! apply the decision. Keeping the arithmetic in one place lets the
//! registration gate, the advancement gate, and the level recompute be
//! tested without a database.

/// Verified members needed for a group to count as full.
pub const GROUP_CAPACITY: i64 = 4;

/// A user owns at most one group per level, levels 1 to 3.
pub const MAX_GROUP_NUMBER: i32 = 3;

/// Highest level a user can reach.
pub const MAX_LEVEL: i32 = 3;

/// The only level a registration invite code may point at.
pub const REGISTRATION_GROUP_NUMBER: i32 = 1;

/// Whether a group with this many verified members is full.
pub fn is_group_full(verified_members: i64) -> bool {
    verified_members >= GROUP_CAPACITY
}

/// Registration gate: non-rejected users already registered with the code.
///
/// This is a looser check than [`is_group_full`]; it counts sign-ups before
/// any of them are verified.
pub fn registration_has_room(registered_with_code: i64) -> bool {
    registered_with_code < GROUP_CAPACITY
}

/// Level after the owner's group `group_number` has filled up.
///
/// Only a user sitting exactly at that level moves up, and never past
/// [`MAX_LEVEL`].
pub fn level_after_full_group(current_level: i32, group_number: i32) -> i32 {
    if current_level == group_number {
        (group_number + 1).min(MAX_LEVEL)
    } else {
        current_level
    }
}

/// Verified count of one group owned by a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnedGroupProgress {
    pub group_number: i32,
    pub verified_members: i64,
}

impl OwnedGroupProgress {
    pub fn new(group_number: i32, verified_members: i64) -> Self {
        Self {
            group_number,
            verified_members,
        }
    }

    pub fn is_full(&self) -> bool {
        is_group_full(self.verified_members)
    }
}

/// Recomputes a user's level from the groups they own.
///
/// Groups are visited in ascending `group_number` with a running level, so a
/// single call reaches the fixed point. The result is never lower than
/// `current_level`.
pub fn recompute_level(current_level: i32, groups: &[OwnedGroupProgress]) -> i32 {
    let mut ordered: Vec<&OwnedGroupProgress> = groups.iter().collect();
    ordered.sort_by_key(|g| g.group_number);

    let level = ordered
        .into_iter()
        .filter(|g| g.is_full())
        .fold(current_level, |level, g| {
            level_after_full_group(level, g.group_number)
        });

    level.max(current_level)
}

/// What the advancement check concluded for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvancementDecision {
    /// The user owns no group yet.
    NoGroups,
    /// All three groups exist.
    AllGroupsOwned,
    /// The highest group has not filled up.
    NotFull {
        last_group_number: i32,
        verified_members: i64,
    },
    /// The highest group is full and the next one may be created.
    Eligible {
        last_group_number: i32,
        next_group_number: i32,
        verified_members: i64,
    },
}

/// Decides whether a user's highest group is full and a next one is due.
///
/// The confirmed-at-next-level gate needs database state and is left to the
/// caller.
pub fn evaluate_advancement(groups: &[OwnedGroupProgress]) -> AdvancementDecision {
    let Some(last) = groups.iter().max_by_key(|g| g.group_number) else {
        return AdvancementDecision::NoGroups;
    };

    if groups.len() >= MAX_GROUP_NUMBER as usize || last.group_number >= MAX_GROUP_NUMBER {
        return AdvancementDecision::AllGroupsOwned;
    }

    if !last.is_full() {
        return AdvancementDecision::NotFull {
            last_group_number: last.group_number,
            verified_members: last.verified_members,
        };
    }

    AdvancementDecision::Eligible {
        last_group_number: last.group_number,
        next_group_number: last.group_number + 1,
        verified_members: last.verified_members,
    }
}
