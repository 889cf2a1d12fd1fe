//! Liveness probe.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use tracing::warn;

use crate::AppState;
use crate::models::HealthResponse;

/// `GET /health`: 200 when the store answers, 503 otherwise.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store_reachable = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("health check: store unreachable: {e}");
            false
        }
    };
    let status = if store_reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            status: if store_reachable { "ok" } else { "degraded" }.into(),
            version: atrium_core::version().into(),
            store_reachable,
        }),
    )
}
