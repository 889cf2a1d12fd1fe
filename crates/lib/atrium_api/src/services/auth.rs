//! Staff administration on top of `atrium_core`.

use std::sync::LazyLock;

use atrium_core::auth::password::hash_password;
use atrium_core::models::auth::Session;
use atrium_core::models::principal::{NewStaff, Principal, PrincipalKind};
use atrium_core::store::{PrincipalStore, StoreError};
use regex::Regex;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{CreateStaffRequest, SessionResponse};

/// Minimum accepted password length for new staff.
const MIN_PASSWORD_LEN: usize = 8;

/// Kinds an administrator of kind `actor` may create or manage.
pub fn manageable_by(actor: PrincipalKind) -> &'static [PrincipalKind] {
    match actor {
        PrincipalKind::MasterAdmin => &PrincipalKind::RESOLUTION_ORDER,
        PrincipalKind::Admin => &[
            PrincipalKind::ProjectManager,
            PrincipalKind::Sales,
            PrincipalKind::Employee,
            PrincipalKind::Client,
        ],
        _ => &[],
    }
}

/// Reject unless `actor` outranks `target`.
pub fn ensure_can_manage(actor: &Principal, target: PrincipalKind) -> AppResult<()> {
    if manageable_by(actor.kind).contains(&target) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Role '{}' may not manage {} accounts",
            actor.kind, target
        )))
    }
}

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    if EMAIL_PATTERN.is_match(&email) {
        Ok(email)
    } else {
        Err(AppError::Validation("A valid email is required".into()))
    }
}

/// Create a staff principal on behalf of `actor`.
pub async fn create_staff(
    store: &dyn PrincipalStore,
    actor: &Principal,
    req: CreateStaffRequest,
) -> AppResult<Principal> {
    if !req.kind.is_staff() {
        return Err(AppError::Validation(
            "Clients are created through OTP sign-in".into(),
        ));
    }
    ensure_can_manage(actor, req.kind)?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".into()));
    }
    let email = normalize_email(&req.email)?;
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let principal = store
        .create_staff(NewStaff {
            kind: req.kind,
            name: name.to_string(),
            email,
            phone: req.phone.filter(|p| !p.trim().is_empty()),
            password_hash: hash_password(&req.password)?,
        })
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => {
                AppError::Validation(format!("A {} with this email already exists", req.kind))
            }
            other => other.into(),
        })?;
    info!(
        principal = %principal.reference(),
        by = %actor.reference(),
        "staff principal created"
    );
    Ok(principal)
}

/// Create the first master admin if the table is empty.
///
/// Returns the new principal, or `None` when one already exists.
pub async fn seed_master_admin(
    store: &dyn PrincipalStore,
    email: &str,
    password: &str,
) -> AppResult<Option<Principal>> {
    if store.count_staff(PrincipalKind::MasterAdmin).await? > 0 {
        return Ok(None);
    }
    let principal = store
        .create_staff(NewStaff {
            kind: PrincipalKind::MasterAdmin,
            name: "Master Admin".into(),
            email: normalize_email(email)?,
            phone: None,
            password_hash: hash_password(password)?,
        })
        .await?;
    info!(principal = %principal.id, "seeded master admin");
    Ok(Some(principal))
}

pub fn session_response(session: &Session) -> SessionResponse {
    SessionResponse {
        success: true,
        token: session.token.token.clone(),
        data: session.principal.clone(),
    }
}
