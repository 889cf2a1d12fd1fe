//! Application error types.

use atrium_core::auth::AuthError;
use atrium_core::store::StoreError;
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Locked: {0}")]
    Locked(String),

    /// An external collaborator (SMS provider) failed.
    #[error("Dependency failure: {0}")]
    Dependency(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Locked(_) => StatusCode::LOCKED,
            AppError::Dependency(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::Validation(m)
            | AppError::Unauthorized(m)
            | AppError::Forbidden(m)
            | AppError::NotFound(m)
            | AppError::Locked(m)
            | AppError::Dependency(m) => m,
            AppError::Internal(detail) => {
                error!("internal error: {detail}");
                "Internal server error".to_string()
            }
        };
        let body = Json(ErrorResponse {
            success: false,
            message,
        });
        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(format!("Invalid path: {}", rejection.body_text()))
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => AppError::NotFound("Principal not found".into()),
            StoreError::AlreadyExists => {
                AppError::Validation("A principal with these details already exists".into())
            }
            StoreError::Unsupported(kind) => {
                AppError::Validation(format!("Operation not supported for {kind}"))
            }
            StoreError::Db(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::InvalidCredentials
            | AuthError::InvalidChallenge
            | AuthError::NoPrincipal
            | AuthError::Deactivated => AppError::Unauthorized(e.to_string()),
            AuthError::Token(_) => AppError::Unauthorized("Invalid or expired token".into()),
            AuthError::ChallengeLocked => AppError::Forbidden(e.to_string()),
            AuthError::LoginLocked => AppError::Locked(e.to_string()),
            AuthError::NotFound(msg) => AppError::NotFound(msg),
            AuthError::Delivery(_) => AppError::Dependency("Failed to send OTP".into()),
            AuthError::Store(e) => AppError::from(e),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_core::sms::SmsError;

    #[test]
    fn auth_errors_map_to_statuses() {
        let cases = [
            (AuthError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::InvalidChallenge, StatusCode::UNAUTHORIZED),
            (AuthError::Token("bad".into()), StatusCode::UNAUTHORIZED),
            (AuthError::NoPrincipal, StatusCode::UNAUTHORIZED),
            (AuthError::Deactivated, StatusCode::UNAUTHORIZED),
            (AuthError::ChallengeLocked, StatusCode::FORBIDDEN),
            (AuthError::LoginLocked, StatusCode::LOCKED),
            (AuthError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                AuthError::Delivery(SmsError("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AuthError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn no_principal_message_is_stable() {
        let err = AppError::from(AuthError::NoPrincipal);
        assert!(matches!(err, AppError::Unauthorized(m) if m == "No user found for token"));
    }

    #[tokio::test]
    async fn internal_detail_is_hidden() {
        let response = AppError::Internal("secret detail".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Internal server error");
    }
}
