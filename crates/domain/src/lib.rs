//! Domain layer for the group growth backend.
//!
//! This crate contains:
//! - Domain models (User, Group, Invite) and request/response payloads
//! - The progression rules that decide group fullness and level advancement

pub mod models;
pub mod services;
