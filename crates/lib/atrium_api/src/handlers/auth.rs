//! Staff login, logout and session introspection.

use axum::extract::State;
use axum::{Extension, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppPath};
use crate::middleware::auth::AuthenticatedPrincipal;
use crate::models::{LoginRequest, MeResponse, MessageResponse, SessionResponse};
use crate::services::auth::session_response;
use crate::services::cookies::{attach_session, clear_session};

/// `POST /api/v1/auth/{channel}/login`: email + password for a staff kind.
pub async fn staff_login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    AppPath(channel): AppPath<String>,
    AppJson(body): AppJson<LoginRequest>,
) -> AppResult<(CookieJar, Json<SessionResponse>)> {
    let kind = super::parse_kind(&channel)?;
    if !kind.is_staff() {
        return Err(AppError::NotFound(format!("No password login for '{channel}'")));
    }
    let session = state
        .login
        .login(kind, &body.email, &body.password, Utc::now())
        .await?;
    let jar = attach_session(
        jar,
        kind,
        &session.token,
        state.config.auth.session_ttl.num_seconds(),
        state.config.auth.is_production,
    );
    Ok((jar, Json(session_response(&session))))
}

/// `POST /api/v1/auth/logout`: expire session cookies. Tokens stay valid
/// until they expire.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    (
        clear_session(jar, state.config.auth.is_production),
        Json(MessageResponse::ok("Logged out successfully")),
    )
}

/// `GET /api/v1/auth/me`
pub async fn me_handler(
    Extension(principal): Extension<AuthenticatedPrincipal>,
) -> Json<MeResponse> {
    Json(MeResponse {
        success: true,
        role: principal.role(),
        data: principal.0,
    })
}
