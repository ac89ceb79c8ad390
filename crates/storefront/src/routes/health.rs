//! Health check endpoints.

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::state::AppState;

/// Liveness: the process is up. Does not check dependencies.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness: Stripe answers a one-product listing. The catalog cache is
/// bypassed, so a warm cache does not hide an outage.
///
/// Returns 503 Service Unavailable when Stripe is unreachable.
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.catalog().ping_source().await {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
