//! Route definitions for job submission.

use axum::routing::post;
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;

/// Routes mounted at `/generate`.
///
/// ```text
/// POST /text-to-image   -> text_to_image
/// POST /image-to-image  -> image_to_image
/// POST /text-to-video   -> text_to_video (501)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/text-to-image", post(generation::text_to_image))
        .route("/image-to-image", post(generation::image_to_image))
        .route("/text-to-video", post(generation::text_to_video))
}

/// Routes mounted at `/upscale`.
///
/// ```text
/// POST /  -> upscale (501)
/// ```
pub fn upscale_router() -> Router<AppState> {
    Router::new().route("/", post(generation::upscale))
}
