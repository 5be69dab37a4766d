//! Handlers for the job history (durable job records).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use genhub_core::error::CoreError;
use genhub_core::types::DbId;
use genhub_db::models::generation::{Generation, GenerationListQuery};
use genhub_pipeline::Outcome;

use crate::error::{AppError, AppResult};
use crate::handlers::generation::GenerationView;
use crate::response::{DataResponse, PageResponse};
use crate::state::AppState;

async fn find_or_404(state: &AppState, id: DbId) -> AppResult<Generation> {
    state
        .records
        .find(id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Generation",
            id,
        }))
}

/// GET /api/v1/history
///
/// Newest first, filtered by kind, status, favorite, and free-text search.
pub async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<GenerationListQuery>,
) -> AppResult<impl IntoResponse> {
    query.validate()?;
    let page = state.records.list(&query).await?;

    Ok(Json(PageResponse {
        data: page.items.into_iter().map(GenerationView::from).collect(),
        total: page.total,
    }))
}

/// GET /api/v1/history/{id}
pub async fn get_generation(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let record = find_or_404(&state, id).await?;
    Ok(Json(DataResponse {
        data: GenerationView::from(record),
    }))
}

/// DELETE /api/v1/history/{id}
pub async fn delete_generation(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if state.records.delete(id).await? {
        tracing::info!(job_id = id, "Generation deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound {
            entity: "Generation",
            id,
        }))
    }
}

/// POST /api/v1/history/{id}/cancel
///
/// Removes a job that has not started yet. A running or finished job
/// yields 409.
pub async fn cancel_generation(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let record = find_or_404(&state, id).await?;

    match state.orchestrator.cancel_queued(record.id).await {
        Outcome::Ok(true) => {
            let cancelled = find_or_404(&state, id).await?;
            Ok(Json(DataResponse {
                data: GenerationView::from(cancelled),
            }))
        }
        Outcome::Ok(false) => Err(AppError::Core(CoreError::Conflict(format!(
            "Generation {id} is not queued (status: {})",
            record.status_name()
        )))),
        Outcome::Degraded(_) => Err(AppError::ServiceUnavailable(
            "Job queue is unavailable".into(),
        )),
    }
}
