//! Handlers for queue introspection and maintenance.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use genhub_core::generation::Priority;
use genhub_pipeline::Outcome;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ClearQueueParams {
    pub priority: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: usize,
}

pub(crate) fn unavailable(component: &str) -> AppError {
    AppError::ServiceUnavailable(format!("{component} is unavailable"))
}

/// GET /api/v1/queue
///
/// Pending jobs per priority lane.
pub async fn get_queue(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    match state.queue.info().await {
        Outcome::Ok(info) => Ok(Json(DataResponse { data: info })),
        Outcome::Degraded(_) => Err(unavailable("Job queue")),
    }
}

/// DELETE /api/v1/queue?priority=
///
/// Drops pending jobs from one lane, or from all lanes. Each dropped job's
/// record is failed and an `error` event is emitted for it.
pub async fn clear_queue(
    State(state): State<AppState>,
    Query(params): Query<ClearQueueParams>,
) -> AppResult<impl IntoResponse> {
    let priority = params
        .priority
        .as_deref()
        .map(str::parse::<Priority>)
        .transpose()?;

    match state.orchestrator.clear_queued(priority).await {
        Outcome::Ok(removed) => {
            tracing::info!(removed, priority = ?priority, "Queue cleared via API");
            Ok(Json(DataResponse {
                data: RemovedResponse { removed },
            }))
        }
        Outcome::Degraded(_) => Err(unavailable("Job queue")),
    }
}
