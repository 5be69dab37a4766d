//! Handlers for runtime provider settings.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ApiKeyRequest {
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct ProviderStatus {
    pub configured: bool,
}

/// POST /api/v1/settings/api-key
///
/// Replaces the provider API key for subsequent jobs.
pub async fn update_api_key(
    State(state): State<AppState>,
    Json(input): Json<ApiKeyRequest>,
) -> AppResult<impl IntoResponse> {
    let key = input.api_key.trim();
    if key.is_empty() {
        return Err(AppError::BadRequest("API key must not be empty".into()));
    }

    state.provider.update_api_key(key.to_string()).await;
    tracing::info!("Provider API key updated");

    Ok(Json(DataResponse {
        data: ProviderStatus {
            configured: state.provider.is_configured().await,
        },
    }))
}
