//! Request handlers.

pub mod admin;
pub mod auth;
pub mod client_auth;
pub mod health;
pub mod principals;

use atrium_core::models::principal::PrincipalKind;

use crate::error::{AppError, AppResult};

/// Principal kind from a path segment; unknown kinds are a 404.
pub(crate) fn parse_kind(raw: &str) -> AppResult<PrincipalKind> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("Unknown principal kind '{raw}'")))
}
