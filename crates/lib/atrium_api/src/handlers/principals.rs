//! Principal lookups and the optionally-authenticated welcome route.

use axum::extract::{Request, State};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::AppPath;
use crate::middleware::auth::AuthenticatedPrincipal;
use crate::middleware::guards::{ADMIN_ROLES, ensure_self_or_roles};
use crate::models::{PrincipalResponse, WelcomeResponse};

/// `GET /api/v1/welcome`
pub async fn welcome_handler(request: Request) -> Json<WelcomeResponse> {
    let response = match request.extensions().get::<AuthenticatedPrincipal>() {
        Some(p) => WelcomeResponse {
            success: true,
            message: format!("Welcome back, {}", p.0.name),
            role: Some(p.role()),
        },
        None => WelcomeResponse {
            success: true,
            message: "Welcome to Atrium".into(),
            role: None,
        },
    };
    Json(response)
}

/// `GET /api/v1/principals/{kind}/{id}`: self, or an administrator.
pub async fn get_principal_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedPrincipal>,
    AppPath((kind, id)): AppPath<(String, Uuid)>,
) -> AppResult<Json<PrincipalResponse>> {
    let target = super::parse_kind(&kind)?.with_id(id);
    ensure_self_or_roles(&caller.0, target, ADMIN_ROLES.0)?;
    let principal = state
        .store
        .find_principal(target)
        .await?
        .ok_or_else(|| AppError::NotFound("Principal not found".into()))?;
    Ok(Json(PrincipalResponse {
        success: true,
        data: principal,
    }))
}
