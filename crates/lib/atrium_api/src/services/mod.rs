//! Services shared by handlers.

pub mod auth;
pub mod cookies;
