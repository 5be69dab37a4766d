#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use genhub_api::config::{CorsOrigins, ServerConfig};
use genhub_api::router::build_app_router;
use genhub_api::state::AppState;
use genhub_core::generation::{GenerationOutput, GenerationRequest};
use genhub_pipeline::{MemoryJobRecords, MemoryStore, RateLimitConfig};
use genhub_provider::{GenerationProvider, ProgressReporter, ProviderError};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: CorsOrigins::List(vec!["http://localhost:5173".to_string()]),
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        database_url: "postgres://unused".to_string(),
        runware_api_key: None,
        runware_api_url: "http://127.0.0.1:9".to_string(),
        storage_path: PathBuf::from("./generated"),
        cache_ttl_secs: 3600,
        rate_limit: RateLimitConfig::default(),
        max_concurrent_generations: 1,
        queue_poll_secs: 1,
    }
}

/// A provider that returns one fixed image per call.
#[derive(Default)]
pub struct StubProvider {
    configured: AtomicBool,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for StubProvider {
    async fn generate(
        &self,
        _request: &GenerationRequest,
        progress: &ProgressReporter,
    ) -> Result<Vec<GenerationOutput>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        progress.report(50.0, "halfway");
        Ok(vec![GenerationOutput {
            asset_location: "/out/1.png".to_string(),
            output_path: None,
            seed: Some(42),
        }])
    }

    async fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    async fn update_api_key(&self, _api_key: String) {
        self.configured.store(true, Ordering::SeqCst);
    }
}

/// The router plus handles on the in-memory services behind it.
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub records: Arc<MemoryJobRecords>,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<StubProvider>,
}

/// Build the full application router over in-memory backends, using the
/// same middleware stack as the binary.
pub fn build_test_app() -> TestApp {
    build_test_app_with(test_config())
}

pub fn build_test_app_with(config: ServerConfig) -> TestApp {
    let records = Arc::new(MemoryJobRecords::new());
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(StubProvider::default());

    let state = AppState::new(
        Arc::new(config),
        records.clone(),
        store.clone(),
        provider.clone(),
    );
    let app = build_app_router(state.clone());

    TestApp {
        app,
        state,
        records,
        store,
        provider,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn delete(app: &Router, uri: &str) -> Response {
    send(app, Method::DELETE, uri, None).await
}

/// Read a response body as JSON.
pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Status and JSON body in one call.
pub async fn json_of(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    (status, body_json(response).await)
}
