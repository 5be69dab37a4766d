//! Bounded worker pool consuming the job queue.
//!
//! A fixed number of long-lived workers each loop on a blocking
//! [`JobQueue::dequeue`] and run the job through the [`Orchestrator`].
//! Workers are registered on a [`TaskTracker`] and stop on a
//! [`CancellationToken`]; a job already running is allowed to finish.

use std::sync::Arc;
use std::time::Duration;

use genhub_core::generation::Priority;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::orchestrator::{Orchestrator, RunOutcome};
use crate::outcome::Outcome;
use crate::queue::JobQueue;

/// Default number of concurrent generations.
pub const DEFAULT_WORKERS: usize = 3;

/// Default blocking dequeue timeout per poll.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolConfig {
    pub workers: usize,
    pub poll_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

pub struct WorkerPool {
    tracker: TaskTracker,
    cancel: CancellationToken,
    workers: usize,
}

impl WorkerPool {
    /// Spawn `config.workers` workers. They stop when `parent` or the
    /// pool's own token is cancelled.
    pub fn start(
        orchestrator: Arc<Orchestrator>,
        queue: Arc<JobQueue>,
        config: WorkerPoolConfig,
        parent: &CancellationToken,
    ) -> Self {
        let tracker = TaskTracker::new();
        let cancel = parent.child_token();
        let workers = config.workers.max(1);

        for worker_id in 0..workers {
            tracker.spawn(run_worker(
                worker_id,
                Arc::clone(&orchestrator),
                Arc::clone(&queue),
                config.poll_timeout,
                cancel.clone(),
            ));
        }
        tracker.close();

        tracing::info!(
            workers,
            poll_timeout_ms = config.poll_timeout.as_millis() as u64,
            "Worker pool started",
        );
        Self {
            tracker,
            cancel,
            workers,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Workers that have not exited yet.
    pub fn active_workers(&self) -> usize {
        self.tracker.len()
    }

    /// Stop taking new jobs and wait up to `timeout` for in-flight jobs.
    /// Returns `false` if some worker was still busy at the deadline.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        tracing::info!("Stopping worker pool");
        self.cancel.cancel();
        let drained = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        if drained {
            tracing::info!("Worker pool stopped");
        } else {
            tracing::warn!(
                active = self.tracker.len(),
                "Worker pool shutdown timed out with jobs still running",
            );
        }
        drained
    }
}

async fn run_worker(
    worker_id: usize,
    orchestrator: Arc<Orchestrator>,
    queue: Arc<JobQueue>,
    poll_timeout: Duration,
    cancel: CancellationToken,
) {
    tracing::debug!(worker_id, "Worker started");

    loop {
        let dequeued = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            dequeued = queue.dequeue(poll_timeout, &Priority::ALL) => dequeued,
        };

        match dequeued {
            Outcome::Ok(Some(descriptor)) => {
                let job_id = descriptor.task_id;
                match orchestrator.run(descriptor).await {
                    RunOutcome::Completed { cached } => {
                        tracing::debug!(worker_id, job_id, cached, "Worker finished job");
                    }
                    RunOutcome::Failed(_) => {
                        tracing::debug!(worker_id, job_id, "Worker finished failed job");
                    }
                }
            }
            Outcome::Ok(None) => {}
            // Back off so a broken backend is not polled in a tight loop.
            Outcome::Degraded(_) => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(poll_timeout) => {}
                }
            }
        }
    }

    tracing::debug!(worker_id, "Worker stopped");
}
