//! Administrative endpoints. Mounted behind `require_roles(ADMIN_ROLES)`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use tracing::info;
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppPath};
use crate::middleware::auth::AuthenticatedPrincipal;
use crate::models::{CreateStaffRequest, PrincipalResponse, SetActiveRequest};
use crate::services::auth::{self, ensure_can_manage};

/// `POST /api/v1/admin/staff`
pub async fn create_staff_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthenticatedPrincipal>,
    AppJson(body): AppJson<CreateStaffRequest>,
) -> AppResult<(StatusCode, Json<PrincipalResponse>)> {
    let principal = auth::create_staff(state.store.as_ref(), &actor.0, body).await?;
    Ok((
        StatusCode::CREATED,
        Json(PrincipalResponse {
            success: true,
            data: principal,
        }),
    ))
}

/// `PATCH /api/v1/admin/principals/{kind}/{id}/active`
pub async fn set_active_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthenticatedPrincipal>,
    AppPath((kind, id)): AppPath<(String, Uuid)>,
    AppJson(body): AppJson<SetActiveRequest>,
) -> AppResult<Json<PrincipalResponse>> {
    let kind = super::parse_kind(&kind)?;
    ensure_can_manage(&actor.0, kind)?;
    let target = kind.with_id(id);
    if target == actor.0.reference() && !body.is_active {
        return Err(AppError::Validation("You cannot deactivate your own account".into()));
    }
    let principal = state.store.set_active(target, body.is_active).await?;
    info!(
        principal = %target,
        by = %actor.0.reference(),
        active = body.is_active,
        "principal activation changed"
    );
    Ok(Json(PrincipalResponse {
        success: true,
        data: principal,
    }))
}

/// `POST /api/v1/admin/principals/{kind}/{id}/unlock`
pub async fn unlock_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthenticatedPrincipal>,
    AppPath((kind, id)): AppPath<(String, Uuid)>,
) -> AppResult<Json<PrincipalResponse>> {
    let kind = super::parse_kind(&kind)?;
    ensure_can_manage(&actor.0, kind)?;
    let target = kind.with_id(id);
    let principal = state.store.clear_lockout(target).await?;
    info!(principal = %target, by = %actor.0.reference(), "lockout cleared");
    Ok(Json(PrincipalResponse {
        success: true,
        data: principal,
    }))
}
