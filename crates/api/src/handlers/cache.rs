//! Handlers for result cache introspection and maintenance.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use genhub_core::generation::GenerationKind;
use genhub_pipeline::Outcome;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::handlers::queue::{unavailable, RemovedResponse};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CacheParams {
    pub generation_kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub ttl_secs: u64,
}

fn parse_kind(params: &CacheParams) -> AppResult<Option<GenerationKind>> {
    Ok(params
        .generation_kind
        .as_deref()
        .map(str::parse::<GenerationKind>)
        .transpose()?)
}

/// GET /api/v1/cache?generation_kind=
pub async fn get_cache(
    State(state): State<AppState>,
    Query(params): Query<CacheParams>,
) -> AppResult<impl IntoResponse> {
    let kind = parse_kind(&params)?;
    match state.cache.entry_count(kind).await {
        Outcome::Ok(entries) => Ok(Json(DataResponse {
            data: CacheStats {
                entries,
                ttl_secs: state.cache.default_ttl().as_secs(),
            },
        })),
        Outcome::Degraded(_) => Err(unavailable("Result cache")),
    }
}

/// DELETE /api/v1/cache?generation_kind=
///
/// Drops cached results for one kind, or all of them.
pub async fn clear_cache(
    State(state): State<AppState>,
    Query(params): Query<CacheParams>,
) -> AppResult<impl IntoResponse> {
    let cleared = match parse_kind(&params)? {
        Some(kind) => state.cache.delete_by_kind(kind).await,
        None => state.cache.clear_all().await,
    };

    match cleared {
        Outcome::Ok(removed) => Ok(Json(DataResponse {
            data: RemovedResponse { removed },
        })),
        Outcome::Degraded(_) => Err(unavailable("Result cache")),
    }
}
