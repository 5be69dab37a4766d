pub mod generation;
pub mod health;
pub mod history;
pub mod maintenance;
pub mod settings;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /health                                 service health
///
/// /generate/text-to-image                 submit (202)
/// /generate/image-to-image                submit (202)
/// /generate/text-to-video                 not implemented (501)
/// /upscale                                not implemented (501)
///
/// /history                                list
/// /history/{id}                           get, delete
/// /history/{id}/cancel                    cancel a queued job (POST)
///
/// /queue                                  lane lengths, clear (DELETE)
/// /cache                                  entry count, clear (DELETE)
///
/// /settings/api-key                       update provider key (POST)
///
/// /ws/generation/{id}                     live job events (WebSocket)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/generate", generation::router())
        .nest("/upscale", generation::upscale_router())
        .nest("/history", history::router())
        .nest("/queue", maintenance::queue_router())
        .nest("/cache", maintenance::cache_router())
        .nest("/settings", settings::router())
        .route("/ws/generation/{id}", get(ws::ws_handler))
}
