//! # atrium_api
//!
//! HTTP API library for Atrium identity and sessions.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use atrium_core::auth::jwt::TokenIssuer;
use atrium_core::auth::login::PasswordLogin;
use atrium_core::auth::otp::OtpManager;
use atrium_core::sms::SmsGateway;
use atrium_core::store::PrincipalStore;
use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, patch, post};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::config::ApiConfig;
use crate::handlers::{admin, auth, client_auth, health, principals};
use crate::middleware::guards::{ADMIN_ROLES, require_roles};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PrincipalStore>,
    pub issuer: TokenIssuer,
    pub otp: OtpManager,
    pub login: PasswordLogin,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// Wire the login flows to `store` and `sms` according to `config`.
    pub fn new(
        store: Arc<dyn PrincipalStore>,
        sms: Arc<dyn SmsGateway>,
        config: ApiConfig,
    ) -> Self {
        let issuer = TokenIssuer::new(config.jwt_secret.as_bytes(), config.auth.session_ttl);
        let otp = OtpManager::new(
            store.clone(),
            sms,
            issuer.clone(),
            config.auth.otp_policy(),
        );
        let login = PasswordLogin::new(store.clone(), issuer.clone(), config.auth.login_policy());
        Self {
            store,
            issuer,
            otp,
            login,
            config,
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `atrium_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    atrium_core::migrate::migrate(pool).await
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    // Cookies need credentialed CORS, which rules out wildcards.
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(
            routes::POST_AUTH_CLIENT_OTP_REQUEST,
            post(client_auth::request_otp_handler),
        )
        .route(
            routes::POST_AUTH_CLIENT_OTP_RESEND,
            post(client_auth::resend_otp_handler),
        )
        .route(
            routes::POST_AUTH_CLIENT_OTP_VERIFY,
            post(client_auth::verify_otp_handler),
        )
        .route(
            routes::POST_AUTH_CHANNEL_LOGIN,
            post(auth::staff_login_handler),
        )
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler));

    // Bound when a valid token is present
    let optional = Router::new()
        .route(routes::GET_WELCOME, get(principals::welcome_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::optional_auth,
        ));

    let admin = Router::new()
        .route(routes::POST_ADMIN_STAFF, post(admin::create_staff_handler))
        .route(
            routes::PATCH_ADMIN_PRINCIPAL_ACTIVE,
            patch(admin::set_active_handler),
        )
        .route(
            routes::POST_ADMIN_PRINCIPAL_UNLOCK,
            post(admin::unlock_handler),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            ADMIN_ROLES,
            require_roles,
        ));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(routes::GET_PRINCIPAL, get(principals::get_principal_handler))
        .merge(admin)
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(optional)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}
