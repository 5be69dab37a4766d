//! Route definitions for provider settings.

use axum::routing::post;
use axum::Router;

use crate::handlers::settings;
use crate::state::AppState;

/// Routes mounted at `/settings`.
///
/// ```text
/// POST /api-key  -> update_api_key
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/api-key", post(settings::update_api_key))
}
