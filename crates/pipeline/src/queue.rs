//! Three-lane priority job queue.
//!
//! Each lane is a FIFO list under `queue:generation:{priority}`. A blocked
//! [`dequeue`](JobQueue::dequeue) re-checks the lanes in priority order on
//! every wake, so a `high` descriptor enqueued while a worker waits is
//! still served before anything in `normal` or `low`.

use std::sync::Arc;
use std::time::Duration;

use genhub_core::generation::{GenerationKind, GenerationRequest, Priority};
use genhub_core::types::DbId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::outcome::Outcome;
use crate::store::Store;

/// Namespace for the lane lists.
pub const QUEUE_KEY_PREFIX: &str = "queue:generation:";

fn default_use_cache() -> bool {
    true
}

/// A pending job. Immutable once enqueued; consumed by exactly one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub task_id: DbId,
    pub generation_kind: GenerationKind,
    pub prompt: String,
    pub params: Map<String, Value>,
    pub priority: Priority,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

impl JobDescriptor {
    pub fn new(task_id: DbId, request: &GenerationRequest, priority: Priority, use_cache: bool) -> Self {
        Self {
            task_id,
            generation_kind: request.kind,
            prompt: request.prompt.clone(),
            params: request.parameters.clone(),
            priority,
            use_cache,
        }
    }

    pub fn to_request(&self) -> GenerationRequest {
        GenerationRequest::new(self.generation_kind, self.prompt.clone(), self.params.clone())
    }
}

/// Per-lane snapshot for introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueInfo {
    pub high: usize,
    pub normal: usize,
    pub low: usize,
    pub total: usize,
}

pub struct JobQueue {
    store: Arc<dyn Store>,
    available: Notify,
}

fn lane_key(priority: Priority) -> String {
    format!("{QUEUE_KEY_PREFIX}{priority}")
}

/// The lanes an optional priority filter targets.
fn lanes(priority: Option<Priority>) -> Vec<Priority> {
    match priority {
        Some(p) => vec![p],
        None => Priority::ALL.to_vec(),
    }
}

impl JobQueue {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            available: Notify::new(),
        }
    }

    /// Append a descriptor to its priority lane.
    ///
    /// `Degraded` means the job was not queued and the caller must fail or
    /// retry it.
    pub async fn enqueue(&self, descriptor: &JobDescriptor) -> Outcome<()> {
        let payload = match serde_json::to_string(descriptor) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(task_id = descriptor.task_id, error = %e, "Failed to encode job descriptor");
                return Outcome::Degraded(e.to_string());
            }
        };

        let pushed = self
            .store
            .rpush(&lane_key(descriptor.priority), payload)
            .await;
        match Outcome::from_store("queue.enqueue", pushed) {
            Outcome::Ok(lane_len) => {
                tracing::info!(
                    task_id = descriptor.task_id,
                    priority = %descriptor.priority,
                    lane_len,
                    "Job enqueued",
                );
                self.available.notify_waiters();
                Outcome::Ok(())
            }
            Outcome::Degraded(reason) => Outcome::Degraded(reason),
        }
    }

    /// Wait up to `timeout` for a descriptor, taking from the first
    /// non-empty lane in `priority_order`.
    pub async fn dequeue(&self, timeout: Duration, priority_order: &[Priority]) -> Outcome<Option<JobDescriptor>> {
        let deadline = Instant::now() + timeout;

        'wake: loop {
            // Registered before the lanes are checked so an enqueue racing
            // with the scan still wakes this call.
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            for &priority in priority_order {
                let popped = self.store.lpop(&lane_key(priority)).await;
                let raw = match Outcome::from_store("queue.dequeue", popped) {
                    Outcome::Ok(Some(raw)) => raw,
                    Outcome::Ok(None) => continue,
                    Outcome::Degraded(reason) => return Outcome::Degraded(reason),
                };
                match serde_json::from_str::<JobDescriptor>(&raw) {
                    Ok(descriptor) => {
                        tracing::debug!(task_id = descriptor.task_id, priority = %priority, "Job dequeued");
                        return Outcome::Ok(Some(descriptor));
                    }
                    Err(e) => {
                        tracing::error!(priority = %priority, error = %e, "Dropping undecodable job descriptor");
                        continue 'wake;
                    }
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Outcome::Ok(None);
            }
        }
    }

    /// Pending descriptors in one lane, or across all lanes.
    pub async fn length(&self, priority: Option<Priority>) -> Outcome<usize> {
        let mut total = 0;
        for lane in lanes(priority) {
            match Outcome::from_store("queue.length", self.store.llen(&lane_key(lane)).await) {
                Outcome::Ok(len) => total += len,
                Outcome::Degraded(reason) => return Outcome::Degraded(reason),
            }
        }
        Outcome::Ok(total)
    }

    /// Drop every pending descriptor in one lane, or in all lanes.
    pub async fn clear(&self, priority: Option<Priority>) -> Outcome<usize> {
        let mut removed = 0;
        for lane in lanes(priority) {
            match Outcome::from_store("queue.clear", self.store.ldrain(&lane_key(lane)).await) {
                Outcome::Ok(items) => removed += items.len(),
                Outcome::Degraded(reason) => return Outcome::Degraded(reason),
            }
        }
        tracing::info!(removed, "Queue cleared");
        Outcome::Ok(removed)
    }

    /// Take every pending descriptor out of one lane, in FIFO order.
    ///
    /// Entries that no longer decode are dropped with an error log.
    pub async fn drain(&self, priority: Priority) -> Outcome<Vec<JobDescriptor>> {
        let drained = self.store.ldrain(&lane_key(priority)).await;
        let items = match Outcome::from_store("queue.drain", drained) {
            Outcome::Ok(items) => items,
            Outcome::Degraded(reason) => return Outcome::Degraded(reason),
        };

        let descriptors: Vec<JobDescriptor> = items
            .into_iter()
            .filter_map(|raw| match serde_json::from_str::<JobDescriptor>(&raw) {
                Ok(descriptor) => Some(descriptor),
                Err(e) => {
                    tracing::error!(priority = %priority, error = %e, "Dropping undecodable job descriptor");
                    None
                }
            })
            .collect();
        tracing::info!(priority = %priority, removed = descriptors.len(), "Lane drained");
        Outcome::Ok(descriptors)
    }

    /// Remove the first pending descriptor with `task_id`. Returns whether
    /// one was found.
    pub async fn remove_task(&self, task_id: DbId, priority: Option<Priority>) -> Outcome<bool> {
        for lane in lanes(priority) {
            let key = lane_key(lane);
            let items = match Outcome::from_store("queue.remove_task", self.store.lrange(&key).await) {
                Outcome::Ok(items) => items,
                Outcome::Degraded(reason) => return Outcome::Degraded(reason),
            };

            let matching = items.into_iter().find(|raw| {
                serde_json::from_str::<JobDescriptor>(raw)
                    .map(|d| d.task_id == task_id)
                    .unwrap_or(false)
            });
            let Some(raw) = matching else {
                continue;
            };

            match Outcome::from_store("queue.remove_task", self.store.lrem_first(&key, &raw).await) {
                Outcome::Ok(true) => {
                    tracing::info!(task_id, priority = %lane, "Job removed from queue");
                    return Outcome::Ok(true);
                }
                // Dequeued between the scan and the removal.
                Outcome::Ok(false) => {}
                Outcome::Degraded(reason) => return Outcome::Degraded(reason),
            }
        }
        Outcome::Ok(false)
    }

    /// Lengths of every lane.
    pub async fn info(&self) -> Outcome<QueueInfo> {
        let mut counts = [0usize; 3];
        for (slot, lane) in counts.iter_mut().zip(Priority::ALL) {
            match self.length(Some(lane)).await {
                Outcome::Ok(len) => *slot = len,
                Outcome::Degraded(reason) => return Outcome::Degraded(reason),
            }
        }
        let [high, normal, low] = counts;
        Outcome::Ok(QueueInfo {
            high,
            normal,
            low,
            total: high + normal + low,
        })
    }
}
