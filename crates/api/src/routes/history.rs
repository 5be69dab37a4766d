//! Route definitions for the job history.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::history;
use crate::state::AppState;

/// Routes mounted at `/history`.
///
/// ```text
/// GET    /             -> list_history
/// GET    /{id}         -> get_generation
/// DELETE /{id}         -> delete_generation
/// POST   /{id}/cancel  -> cancel_generation
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(history::list_history))
        .route(
            "/{id}",
            get(history::get_generation).delete(history::delete_generation),
        )
        .route("/{id}/cancel", post(history::cancel_generation))
}
