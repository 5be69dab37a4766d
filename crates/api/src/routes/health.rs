use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` when every dependency answers, `degraded` otherwise.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub db_healthy: bool,
    /// Whether the cache/queue store answers.
    pub store_healthy: bool,
    /// Whether the provider has an API key.
    pub provider_configured: bool,
}

/// GET /health -- returns service and dependency health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = state.records.health_check().await.is_ok();
    let store_healthy = state.store.ping().await.is_ok();
    let provider_configured = state.provider.is_configured().await;

    let status = if db_healthy && store_healthy {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        store_healthy,
        provider_configured,
    })
}

/// Mount health check routes. Served both at the root and under `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
