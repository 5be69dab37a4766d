//! Route definitions for queue and cache introspection.

use axum::routing::get;
use axum::Router;

use crate::handlers::{cache, queue};
use crate::state::AppState;

/// Routes mounted at `/queue`.
///
/// ```text
/// GET    /             -> get_queue
/// DELETE /?priority=   -> clear_queue
/// ```
pub fn queue_router() -> Router<AppState> {
    Router::new().route("/", get(queue::get_queue).delete(queue::clear_queue))
}

/// Routes mounted at `/cache`.
///
/// ```text
/// GET    /?generation_kind=  -> get_cache
/// DELETE /?generation_kind=  -> clear_cache
/// ```
pub fn cache_router() -> Router<AppState> {
    Router::new().route("/", get(cache::get_cache).delete(cache::clear_cache))
}
