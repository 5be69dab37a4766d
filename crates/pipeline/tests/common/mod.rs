#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use genhub_core::generation::{GenerationKind, GenerationOutput, GenerationRequest, Priority};
use genhub_events::{EventSink, ProgressEvent};
use genhub_pipeline::cache::DEFAULT_TTL;
use genhub_pipeline::{
    JobQueue, MemoryJobRecords, MemoryStore, Orchestrator, ResultCache, Store, StoreError,
    Submission,
};
use genhub_provider::{GenerationProvider, ProgressReporter, ProviderError};
use serde_json::{json, Map, Value};
use tokio::sync::{oneshot, Mutex};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub fn text_to_image(prompt: &str) -> GenerationRequest {
    let mut params = Map::new();
    params.insert("width".into(), json!(512));
    params.insert("height".into(), json!(512));
    params.insert("steps".into(), json!(25));
    params.insert("seed".into(), Value::Null);
    GenerationRequest::new(GenerationKind::TextToImage, prompt, params)
}

pub fn submission(prompt: &str) -> Submission {
    Submission {
        request: text_to_image(prompt),
        priority: Priority::Normal,
        use_cache: true,
    }
}

pub fn output(location: &str, seed: i64) -> GenerationOutput {
    GenerationOutput {
        asset_location: location.to_string(),
        output_path: Some(format!("generated{location}")),
        seed: Some(seed),
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// A store whose backend is always unreachable.
pub struct DownStore;

fn down<T>() -> Result<T, StoreError> {
    Err(StoreError::Unavailable("connection refused".into()))
}

#[async_trait]
impl Store for DownStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        down()
    }
    async fn set_ex(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), StoreError> {
        down()
    }
    async fn delete(&self, _key: &str) -> Result<bool, StoreError> {
        down()
    }
    async fn scan_prefix(&self, _prefix: &str) -> Result<Vec<String>, StoreError> {
        down()
    }
    async fn incr(&self, _key: &str) -> Result<i64, StoreError> {
        down()
    }
    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<bool, StoreError> {
        down()
    }
    async fn rpush(&self, _key: &str, _value: String) -> Result<usize, StoreError> {
        down()
    }
    async fn lpop(&self, _key: &str) -> Result<Option<String>, StoreError> {
        down()
    }
    async fn llen(&self, _key: &str) -> Result<usize, StoreError> {
        down()
    }
    async fn lrange(&self, _key: &str) -> Result<Vec<String>, StoreError> {
        down()
    }
    async fn lrem_first(&self, _key: &str, _value: &str) -> Result<bool, StoreError> {
        down()
    }
    async fn ldrain(&self, _key: &str) -> Result<Vec<String>, StoreError> {
        down()
    }
    async fn ping(&self) -> Result<(), StoreError> {
        down()
    }
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Reports a fixed list of progress updates, then returns a fixed result.
pub struct ScriptedProvider {
    updates: Vec<(f64, String)>,
    result: Result<Vec<GenerationOutput>, String>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn succeeding(outputs: Vec<GenerationOutput>) -> Self {
        Self {
            updates: Vec::new(),
            result: Ok(outputs),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            updates: Vec::new(),
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_updates(mut self, updates: &[(f64, &str)]) -> Self {
        self.updates = updates
            .iter()
            .map(|(pct, msg)| (*pct, msg.to_string()))
            .collect();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn generate(
        &self,
        _request: &GenerationRequest,
        progress: &ProgressReporter,
    ) -> Result<Vec<GenerationOutput>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for (pct, msg) in &self.updates {
            progress.report(*pct, msg.clone());
        }
        self.result.clone().map_err(ProviderError::Failed)
    }
}

/// Signals when the call starts, waits for a release, then reports 50%
/// and returns its result.
pub struct GatedProvider {
    started: Mutex<Option<oneshot::Sender<()>>>,
    release: Mutex<Option<oneshot::Receiver<()>>>,
    result: Result<Vec<GenerationOutput>, String>,
}

pub struct Gate {
    pub started: oneshot::Receiver<()>,
    pub release: oneshot::Sender<()>,
}

impl GatedProvider {
    pub fn new(result: Result<Vec<GenerationOutput>, String>) -> (Self, Gate) {
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        (
            Self {
                started: Mutex::new(Some(started_tx)),
                release: Mutex::new(Some(release_rx)),
                result,
            },
            Gate {
                started: started_rx,
                release: release_tx,
            },
        )
    }
}

#[async_trait]
impl GenerationProvider for GatedProvider {
    async fn generate(
        &self,
        _request: &GenerationRequest,
        progress: &ProgressReporter,
    ) -> Result<Vec<GenerationOutput>, ProviderError> {
        if let Some(started) = self.started.lock().await.take() {
            let _ = started.send(());
        }
        let release = self.release.lock().await.take();
        if let Some(release) = release {
            let _ = release.await;
        }
        progress.report(50.0, "halfway");
        self.result.clone().map_err(ProviderError::Failed)
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Records every emitted event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub async fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().await.clone()
    }

    pub async fn events_for(&self, job_id: i64) -> Vec<ProgressEvent> {
        self.events()
            .await
            .into_iter()
            .filter(|e| e.job_id == job_id)
            .collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: &ProgressEvent) {
        self.events.lock().await.push(event.clone());
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub records: Arc<MemoryJobRecords>,
    pub queue: Arc<JobQueue>,
    pub cache: Arc<ResultCache>,
    pub sink: Arc<RecordingSink>,
    pub orchestrator: Arc<Orchestrator>,
}

/// Wire an orchestrator over in-memory doubles.
pub fn harness(provider: Arc<dyn GenerationProvider>) -> Harness {
    harness_with_stores(
        provider,
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
        Vec::new(),
    )
}

pub fn harness_with_stores(
    provider: Arc<dyn GenerationProvider>,
    queue_store: Arc<dyn Store>,
    cache_store: Arc<dyn Store>,
    extra_sinks: Vec<Arc<dyn EventSink>>,
) -> Harness {
    let records = Arc::new(MemoryJobRecords::new());
    let queue = Arc::new(JobQueue::new(queue_store));
    let cache = Arc::new(ResultCache::new(cache_store, DEFAULT_TTL));
    let sink = Arc::new(RecordingSink::default());

    let mut sinks: Vec<Arc<dyn EventSink>> = vec![sink.clone()];
    sinks.extend(extra_sinks);

    let orchestrator = Arc::new(Orchestrator::new(
        records.clone(),
        queue.clone(),
        cache.clone(),
        provider,
        sinks,
    ));

    Harness {
        records,
        queue,
        cache,
        sink,
        orchestrator,
    }
}
