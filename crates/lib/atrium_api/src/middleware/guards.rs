//! Role-based authorization guards.
//!
//! Must run after `require_auth`: they read the bound principal from the
//! request extensions.

use atrium_core::models::principal::{Principal, PrincipalKind, PrincipalRef};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::auth::AuthenticatedPrincipal;
use crate::error::{AppError, AppResult};

/// Allow-list of roles, used as middleware state.
#[derive(Debug, Clone, Copy)]
pub struct AllowedRoles(pub &'static [PrincipalKind]);

/// Roles that may administer other principals.
pub const ADMIN_ROLES: AllowedRoles =
    AllowedRoles(&[PrincipalKind::MasterAdmin, PrincipalKind::Admin]);

/// Reject with 403 unless `principal`'s role is in `allowed`.
pub fn ensure_role(principal: &Principal, allowed: &[PrincipalKind]) -> AppResult<()> {
    if allowed.contains(&principal.kind) {
        return Ok(());
    }
    warn!(principal = %principal.reference(), "role not permitted");
    Err(AppError::Forbidden(format!(
        "Role '{}' is not permitted to access this resource",
        principal.kind
    )))
}

/// Admit the owner of a resource or any elevated role.
pub fn ensure_self_or_roles(
    principal: &Principal,
    owner: PrincipalRef,
    elevated: &[PrincipalKind],
) -> AppResult<()> {
    if principal.reference() == owner {
        return Ok(());
    }
    ensure_role(principal, elevated)
}

/// Middleware form of `ensure_role`.
pub async fn require_roles(
    State(allowed): State<AllowedRoles>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = request
        .extensions()
        .get::<AuthenticatedPrincipal>()
        .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".into()))?;
    ensure_role(&principal.0, allowed.0)?;
    Ok(next.run(request).await)
}
