//! Identity resolution middleware.
//!
//! Finds a session token (bearer header, then `token` cookie, then
//! `sales_token` cookie), verifies it, resolves it to an active principal and
//! stores `AuthenticatedPrincipal` in the request extensions.

use atrium_core::auth::identity::authenticate_token;
use atrium_core::models::principal::{Principal, PrincipalKind};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use crate::AppState;
use crate::error::AppError;
use crate::services::cookies::{SALES_COOKIE, SESSION_COOKIE};

/// The principal bound to the current request.
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal(pub Principal);

impl AuthenticatedPrincipal {
    pub fn role(&self) -> PrincipalKind {
        self.0.kind
    }
}

/// Session token carried by the request, if any.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    let jar = CookieJar::from_headers(headers);
    [SESSION_COOKIE, SALES_COOKIE]
        .into_iter()
        .filter_map(|name| jar.get(name))
        .map(|c| c.value().to_string())
        .find(|v| !v.is_empty())
}

async fn bind(state: &AppState, token: &str) -> Result<Principal, AppError> {
    authenticate_token(&state.issuer, state.store.as_ref(), token)
        .await
        .map_err(AppError::from)
}

/// Reject the request with 401 unless it carries a token for an active
/// principal.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".into()))?;

    let principal = bind(&state, &token).await?;
    debug!(principal = %principal.reference(), path = %request.uri().path(), "request authenticated");
    request
        .extensions_mut()
        .insert(AuthenticatedPrincipal(principal));

    Ok(next.run(request).await)
}

/// Bind a principal when a valid token is present; otherwise continue
/// anonymously.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_token(request.headers()) {
        match bind(&state, &token).await {
            Ok(principal) => {
                request
                    .extensions_mut()
                    .insert(AuthenticatedPrincipal(principal));
            }
            Err(e) => debug!("optional auth skipped: {e}"),
        }
    }
    next.run(request).await
}
