//! Domain models for users, referral groups and invites.

pub mod group;
pub mod invite;
pub mod user;

pub use group::{Group, GroupWithCounts};
pub use invite::Invite;
pub use user::{PackType, User, UserRole, UserStatus};
