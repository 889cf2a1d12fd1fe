//! Domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! models (which carry `#[serde(rename)]` for camelCase etc.).

pub mod auth;
pub mod principal;
