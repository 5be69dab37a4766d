use std::sync::Arc;

use genhub_events::{EventSink, ProgressHub};
use genhub_pipeline::{
    JobQueue, JobRecords, Orchestrator, RateLimiter, ResultCache, Store,
};
use genhub_provider::GenerationProvider;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every service sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Durable job records.
    pub records: Arc<dyn JobRecords>,
    /// Backend shared by cache, queue, and rate counters.
    pub store: Arc<dyn Store>,
    pub queue: Arc<JobQueue>,
    pub cache: Arc<ResultCache>,
    pub rate_limiter: Arc<RateLimiter>,
    /// Per-job progress pub/sub.
    pub hub: Arc<ProgressHub>,
    /// Live per-job WebSocket connections.
    pub ws_manager: Arc<WsManager>,
    pub provider: Arc<dyn GenerationProvider>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Construct every pipeline service over the given backends and wire
    /// the orchestrator to emit into both the hub and the broadcaster.
    pub fn new(
        config: Arc<ServerConfig>,
        records: Arc<dyn JobRecords>,
        store: Arc<dyn Store>,
        provider: Arc<dyn GenerationProvider>,
    ) -> Self {
        let queue = Arc::new(JobQueue::new(Arc::clone(&store)));
        let cache = Arc::new(ResultCache::new(Arc::clone(&store), config.cache_ttl()));
        let rate_limiter = Arc::new(RateLimiter::new(Arc::clone(&store), config.rate_limit));
        let hub = Arc::new(ProgressHub::default());
        let ws_manager = Arc::new(WsManager::new());

        let sinks: Vec<Arc<dyn EventSink>> = vec![
            hub.clone() as Arc<dyn EventSink>,
            ws_manager.clone() as Arc<dyn EventSink>,
        ];
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&records),
            Arc::clone(&queue),
            Arc::clone(&cache),
            Arc::clone(&provider),
            sinks,
        ));

        Self {
            config,
            records,
            store,
            queue,
            cache,
            rate_limiter,
            hub,
            ws_manager,
            provider,
            orchestrator,
        }
    }
}
