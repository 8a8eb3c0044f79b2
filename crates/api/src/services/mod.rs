//! Application services.

pub mod admin_bootstrap;
pub mod auth;
pub mod progression;

pub use auth::{AuthError, AuthService};
pub use progression::{Confirmer, ProgressionError, ProgressionService};
