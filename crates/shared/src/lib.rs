//! Shared utilities for the group growth backend.
//!
//! This crate provides functionality used across the other crates:
//! - Password hashing with Argon2id
//! - JWT access token issuing and validation
//! - Common validation logic

pub mod jwt;
pub mod password;
pub mod validation;
