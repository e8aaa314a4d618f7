use crate::api::MgmtState;
use crate::api::schemas::health::HealthResponse;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

/// Liveness check: returns 200 OK as long as the server is running.
pub async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness check: verifies connectivity to the database when one is configured.
pub async fn readyz(State(state): State<MgmtState>) -> impl IntoResponse {
    let (status_code, database) = if !state.health_service.has_database() {
        (StatusCode::OK, "skipped")
    } else if let Err(e) = state.health_service.check_db().await {
        tracing::warn!(error = %e, component = "database", "Readiness check failed");
        (StatusCode::SERVICE_UNAVAILABLE, "error")
    } else {
        (StatusCode::OK, "ok")
    };

    let status = if status_code == StatusCode::OK { "ok" } else { "error" };
    let response = HealthResponse { status: status.to_string(), database: database.to_string() };

    (status_code, Json(response))
}
