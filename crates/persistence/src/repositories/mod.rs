//! Repository implementations for database operations.
//!
//! Each repository owns a pool for standalone reads and writes. Associated
//! functions taking `&mut PgConnection` run inside a caller's transaction.

pub mod group;
pub mod invite;
pub mod user;

pub use group::GroupRepository;
pub use invite::InviteRepository;
pub use user::{NewUser, ProfileChanges, UserRepository};
