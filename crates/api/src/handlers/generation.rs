//! Handlers for job submission.
//!
//! Submission returns as soon as the record is persisted and the job is
//! queued; execution happens on the worker pool.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use genhub_core::generation::{GenerationKind, GenerationRequest, Priority};
use genhub_db::models::generation::{
    Generation, ImageToImageRequest, TextToImageRequest, TextToVideoRequest, UpscaleRequest,
};
use genhub_pipeline::Submission;
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// A job record with its status spelled out.
#[derive(Debug, Serialize)]
pub struct GenerationView {
    #[serde(flatten)]
    pub record: Generation,
    pub status: &'static str,
}

impl From<Generation> for GenerationView {
    fn from(record: Generation) -> Self {
        let status = record.status_name();
        Self { record, status }
    }
}

async fn admit(
    state: &AppState,
    request: GenerationRequest,
    priority: Priority,
    use_cache: bool,
) -> AppResult<impl IntoResponse> {
    let record = state
        .orchestrator
        .submit(Submission {
            request,
            priority,
            use_cache,
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: GenerationView::from(record),
        }),
    ))
}

// ---------------------------------------------------------------------------
// Image generation
// ---------------------------------------------------------------------------

/// POST /api/v1/generate/text-to-image
pub async fn text_to_image(
    State(state): State<AppState>,
    Json(input): Json<TextToImageRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    admit(&state, input.to_generation_request(), input.priority, input.use_cache).await
}

/// POST /api/v1/generate/image-to-image
pub async fn image_to_image(
    State(state): State<AppState>,
    Json(input): Json<ImageToImageRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    admit(&state, input.to_generation_request(), input.priority, input.use_cache).await
}

// ---------------------------------------------------------------------------
// Not yet available
// ---------------------------------------------------------------------------

/// POST /api/v1/generate/text-to-video
///
/// Validated, then refused with 501. No record is created.
pub async fn text_to_video(Json(input): Json<TextToVideoRequest>) -> AppResult<StatusCode> {
    input.validate()?;
    GenerationKind::TextToVideo.ensure_supported()?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/v1/upscale
///
/// Validated, then refused with 501. No record is created.
pub async fn upscale(Json(input): Json<UpscaleRequest>) -> AppResult<StatusCode> {
    input.validate()?;
    GenerationKind::Upscale.ensure_supported()?;
    Ok(StatusCode::ACCEPTED)
}
