//! Drives one generation job from admission to a terminal state.
//!
//! `submit` persists the record in `processing` and enqueues the job; a
//! worker later calls `run`, which executes the provider call and moves the
//! record to `completed` or `failed`. Every event is written to all sinks
//! (the progress hub and the live connection broadcaster). One sink's
//! failure never affects another, and neither affects the record.

use std::sync::Arc;

use genhub_core::error::CoreError;
use genhub_core::generation::{GenerationOutput, GenerationRequest, Priority};
use genhub_core::types::DbId;
use genhub_db::models::generation::{CompleteGeneration, CreateGeneration, Generation};
use genhub_events::{EventSink, ProgressEvent};
use genhub_provider::{GenerationProvider, ProgressReporter, ProviderError};
use serde_json::json;
use tokio::time::Instant;

use crate::cache::ResultCache;
use crate::outcome::Outcome;
use crate::queue::{JobDescriptor, JobQueue};
use crate::records::{JobRecords, RecordError};

/// Error text recorded on a job removed from the queue before it started.
pub const CANCELLED_MESSAGE: &str = "Cancelled before execution";

/// Error text recorded on jobs dropped by a queue clear.
pub const CLEARED_MESSAGE: &str = "Removed from queue before execution";

/// A validated request ready to be admitted.
#[derive(Debug, Clone)]
pub struct Submission {
    pub request: GenerationRequest,
    pub priority: Priority,
    pub use_cache: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The request was refused before any record was created.
    #[error(transparent)]
    Rejected(#[from] CoreError),

    #[error("Failed to create job record: {0}")]
    Record(#[from] RecordError),

    /// The record was created (and has been failed) but the job could not
    /// be queued.
    #[error("Job {job_id} could not be queued: {reason}")]
    Enqueue { job_id: DbId, reason: String },
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed { cached: bool },
    Failed(String),
}

pub struct Orchestrator {
    records: Arc<dyn JobRecords>,
    queue: Arc<JobQueue>,
    cache: Arc<ResultCache>,
    provider: Arc<dyn GenerationProvider>,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Orchestrator {
    pub fn new(
        records: Arc<dyn JobRecords>,
        queue: Arc<JobQueue>,
        cache: Arc<ResultCache>,
        provider: Arc<dyn GenerationProvider>,
        sinks: Vec<Arc<dyn EventSink>>,
    ) -> Self {
        Self {
            records,
            queue,
            cache,
            provider,
            sinks,
        }
    }

    /// Admit a job: reject unsupported kinds, persist the `processing`
    /// record, and enqueue its descriptor.
    pub async fn submit(&self, submission: Submission) -> Result<Generation, SubmitError> {
        submission.request.kind.ensure_supported()?;

        let record = self
            .records
            .create(&CreateGeneration::from_request(&submission.request))
            .await?;

        let descriptor = JobDescriptor::new(
            record.id,
            &submission.request,
            submission.priority,
            submission.use_cache,
        );

        match self.queue.enqueue(&descriptor).await {
            Outcome::Ok(()) => {
                tracing::info!(
                    job_id = record.id,
                    kind = %submission.request.kind,
                    priority = %submission.priority,
                    "Job admitted",
                );
                Ok(record)
            }
            Outcome::Degraded(reason) => {
                let message = format!("Failed to queue job: {reason}");
                self.mark_failed(record.id, &message, None).await;
                self.emit(ProgressEvent::error(record.id, &message)).await;
                Err(SubmitError::Enqueue {
                    job_id: record.id,
                    reason,
                })
            }
        }
    }

    /// Remove a not-yet-started job from the queue and fail its record.
    ///
    /// Returns `Ok(false)` when the job is not queued (already running,
    /// finished, or unknown). A running provider call is never interrupted.
    pub async fn cancel_queued(&self, job_id: DbId) -> Outcome<bool> {
        match self.queue.remove_task(job_id, None).await {
            Outcome::Ok(true) => {
                self.mark_failed(job_id, CANCELLED_MESSAGE, None).await;
                self.emit(ProgressEvent::error(job_id, CANCELLED_MESSAGE)).await;
                Outcome::Ok(true)
            }
            other => other,
        }
    }

    /// Drop every not-yet-started job in one lane, or in all lanes, failing
    /// each job's record. Returns how many jobs were removed.
    ///
    /// Lanes are drained one at a time; if the queue backend fails part way,
    /// jobs from lanes already drained have been failed.
    pub async fn clear_queued(&self, priority: Option<Priority>) -> Outcome<usize> {
        let lanes = match priority {
            Some(p) => vec![p],
            None => Priority::ALL.to_vec(),
        };

        let mut removed = 0;
        for lane in lanes {
            let descriptors = match self.queue.drain(lane).await {
                Outcome::Ok(descriptors) => descriptors,
                Outcome::Degraded(reason) => return Outcome::Degraded(reason),
            };
            for descriptor in descriptors {
                let job_id = descriptor.task_id;
                self.mark_failed(job_id, CLEARED_MESSAGE, None).await;
                self.emit(ProgressEvent::error(job_id, CLEARED_MESSAGE)).await;
                removed += 1;
            }
        }

        tracing::info!(removed, priority = ?priority, "Queued jobs cleared");
        Outcome::Ok(removed)
    }

    /// Execute a dequeued job to completion.
    pub async fn run(&self, descriptor: JobDescriptor) -> RunOutcome {
        let job_id = descriptor.task_id;
        let started = Instant::now();
        tracing::info!(job_id, kind = %descriptor.generation_kind, "Job started");

        self.emit(ProgressEvent::progress(job_id, 10.0, "Initializing"))
            .await;

        let request = descriptor.to_request();
        let cache_key = descriptor
            .use_cache
            .then(|| ResultCache::fingerprint_request(&request));

        if let Some(key) = &cache_key {
            if let Some(outputs) = self.cached_outputs(job_id, key).await {
                self.emit(ProgressEvent::progress(job_id, 100.0, "Retrieved from cache"))
                    .await;
                return self.finish_success(job_id, outputs, started, None, true).await;
            }
        }

        match self.execute(job_id, &request).await {
            Ok(outputs) => {
                self.finish_success(job_id, outputs, started, cache_key.as_deref(), false)
                    .await
            }
            Err(e) => self.finish_failure(job_id, e.to_string(), started).await,
        }
    }

    // ---- private helpers ----

    /// Call the provider, re-emitting its progress reports as they arrive.
    async fn execute(
        &self,
        job_id: DbId,
        request: &GenerationRequest,
    ) -> Result<Vec<GenerationOutput>, ProviderError> {
        let (reporter, mut updates) = ProgressReporter::channel();

        let result = {
            let call = self.provider.generate(request, &reporter);
            tokio::pin!(call);
            loop {
                tokio::select! {
                    biased;
                    Some(update) = updates.recv() => {
                        self.emit(ProgressEvent::progress(job_id, update.percent, update.message))
                            .await;
                    }
                    result = &mut call => break result,
                }
            }
        };

        // Reports sent just before the call returned.
        while let Ok(update) = updates.try_recv() {
            self.emit(ProgressEvent::progress(job_id, update.percent, update.message))
                .await;
        }
        result
    }

    async fn cached_outputs(&self, job_id: DbId, key: &str) -> Option<Vec<GenerationOutput>> {
        let value = self.cache.get(key).await.ok().flatten()?;
        match serde_json::from_value::<Vec<GenerationOutput>>(value) {
            Ok(outputs) if !outputs.is_empty() => {
                tracing::info!(job_id, "Serving job from result cache");
                Some(outputs)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Cached result has unexpected shape");
                None
            }
        }
    }

    async fn finish_success(
        &self,
        job_id: DbId,
        outputs: Vec<GenerationOutput>,
        started: Instant,
        cache_key: Option<&str>,
        cached: bool,
    ) -> RunOutcome {
        let Some(primary) = outputs.first() else {
            return self
                .finish_failure(job_id, ProviderError::EmptyResult.to_string(), started)
                .await;
        };
        let processing_time = started.elapsed().as_secs_f64();
        let complete = CompleteGeneration {
            output_path: primary.output_path.clone(),
            output_url: Some(primary.asset_location.clone()),
            seed: primary.seed,
            processing_time,
        };

        match self.records.complete(job_id, &complete).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(job_id, "Job record was not processing, completion ignored"),
            Err(e) => tracing::error!(job_id, error = %e, "Failed to mark job completed"),
        }

        let payload = json!({
            "generation_id": job_id,
            "results": outputs,
            "output_path": complete.output_path,
            "output_url": complete.output_url,
            "seed": complete.seed,
            "processing_time": processing_time,
            "cached": cached,
        });
        self.emit(ProgressEvent::complete(job_id, payload)).await;

        if let Some(key) = cache_key {
            match serde_json::to_value(&outputs) {
                Ok(value) => {
                    // Advisory: a failed write is logged by the cache.
                    let _ = self.cache.set(key, &value, None).await;
                }
                Err(e) => tracing::warn!(job_id, error = %e, "Failed to encode result for cache"),
            }
        }

        tracing::info!(job_id, processing_time, cached, "Job completed");
        RunOutcome::Completed { cached }
    }

    async fn finish_failure(&self, job_id: DbId, message: String, started: Instant) -> RunOutcome {
        let processing_time = started.elapsed().as_secs_f64();
        tracing::error!(job_id, error = %message, "Job failed");

        self.mark_failed(job_id, &message, Some(processing_time)).await;
        self.emit(ProgressEvent::error(job_id, &message)).await;
        RunOutcome::Failed(message)
    }

    async fn mark_failed(&self, job_id: DbId, message: &str, processing_time: Option<f64>) {
        match self.records.fail(job_id, message, processing_time).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(job_id, "Job record was not processing, failure ignored"),
            Err(e) => tracing::error!(job_id, error = %e, "Failed to mark job failed"),
        }
    }

    async fn emit(&self, event: ProgressEvent) {
        for sink in &self.sinks {
            sink.emit(&event).await;
        }
    }
}
