//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod group;
pub mod invite;
pub mod user;

pub use group::{
    GroupEntity, GroupMemberEntity, GroupPreviewEntity, GroupWithCountsEntity,
    OwnedGroupCountEntity, OwnerGroupProgressEntity,
};
pub use invite::InviteEntity;
pub use user::{PackTypeDb, UserEntity, UserRoleDb, UserStatusDb};
