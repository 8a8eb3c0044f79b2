//! HTTP route handlers.

pub mod admin;
pub mod auth;
pub mod groups;
pub mod health;
pub mod users;
