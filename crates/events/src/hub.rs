//! Per-job publish/subscribe on top of the [`EventBus`].
//!
//! A job's first [`subscribe`](ProgressHub::subscribe) spawns exactly one
//! listener task that filters the bus for that job id and forwards into a
//! small per-job broadcast channel. Later subscriptions to the same job
//! share that channel. The listener is cancelled when the last subscriber
//! leaves (an explicit [`unsubscribe`](ProgressHub::unsubscribe) or a
//! dropped [`Subscription`]), or for every job at once on
//! [`shutdown`](ProgressHub::shutdown).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use genhub_core::types::DbId;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bus::EventBus;
use crate::event::ProgressEvent;

/// Per-subscriber queue depth. A subscriber that falls further behind
/// than this skips the oldest events.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

/// How long shutdown waits for each listener task to exit.
const LISTENER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// One job's shared listener.
struct Topic {
    id: u64,
    sender: broadcast::Sender<ProgressEvent>,
    subscribers: usize,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

type Topics = Mutex<HashMap<DbId, Topic>>;

/// The lock is never held across an await point.
fn lock(topics: &Topics) -> MutexGuard<'_, HashMap<DbId, Topic>> {
    topics.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drop one subscriber from `job_id`'s topic, stopping the listener when it
/// was the last. A `topic_id` from an earlier, already-stopped topic is
/// ignored.
fn release(topics: &Topics, job_id: DbId, topic_id: u64) {
    let mut topics = lock(topics);
    let Some(topic) = topics.get_mut(&job_id) else {
        return;
    };
    if topic.id != topic_id {
        return;
    }

    topic.subscribers = topic.subscribers.saturating_sub(1);
    if topic.subscribers == 0 {
        if let Some(topic) = topics.remove(&job_id) {
            topic.cancel.cancel();
            tracing::debug!(job_id, "Progress listener stopped");
        }
    }
}

/// Handle returned by [`ProgressHub::subscribe`].
///
/// Dropping the handle releases the subscription.
pub struct Subscription {
    job_id: DbId,
    topic_id: u64,
    receiver: broadcast::Receiver<ProgressEvent>,
    topics: Weak<Topics>,
}

impl Subscription {
    pub fn job_id(&self) -> DbId {
        self.job_id
    }

    /// Wait for the next event for this job.
    ///
    /// Returns `None` once the listener has been torn down. Events dropped
    /// because this subscriber lagged are skipped with a warning.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(job_id = self.job_id, skipped, "Progress subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(topics) = self.topics.upgrade() {
            release(&topics, self.job_id, self.topic_id);
        }
    }
}

/// Per-job progress pub/sub hub.
pub struct ProgressHub {
    bus: EventBus,
    topics: Arc<Topics>,
    /// Master cancellation token, cancelled during shutdown.
    cancel: CancellationToken,
    subscriber_capacity: usize,
    next_topic_id: AtomicU64,
}

impl ProgressHub {
    pub fn new(bus: EventBus) -> Self {
        Self::with_subscriber_capacity(bus, DEFAULT_SUBSCRIBER_CAPACITY)
    }

    pub fn with_subscriber_capacity(bus: EventBus, subscriber_capacity: usize) -> Self {
        Self {
            bus,
            topics: Arc::new(Mutex::new(HashMap::new())),
            cancel: CancellationToken::new(),
            subscriber_capacity: subscriber_capacity.max(1),
            next_topic_id: AtomicU64::new(1),
        }
    }

    /// Publish an event. It reaches every current subscriber of
    /// `event.job_id`; with no subscribers it is dropped.
    pub fn publish(&self, event: ProgressEvent) {
        self.bus.publish(event);
    }

    /// Subscribe to one job's events.
    ///
    /// Every event published after this returns is observed (subject to the
    /// per-subscriber queue depth). Subscribing after shutdown yields a
    /// handle whose `recv` returns `None` immediately.
    pub async fn subscribe(&self, job_id: DbId) -> Subscription {
        let mut topics = lock(&self.topics);

        if self.cancel.is_cancelled() {
            let (sender, receiver) = broadcast::channel(1);
            drop(sender);
            return self.handle(job_id, 0, receiver);
        }

        if let Some(topic) = topics.get_mut(&job_id) {
            topic.subscribers += 1;
            let receiver = topic.sender.subscribe();
            return self.handle(job_id, topic.id, receiver);
        }

        let (sender, receiver) = broadcast::channel(self.subscriber_capacity);
        // Taken before the task is spawned so nothing published between
        // here and the task's first poll is missed.
        let bus_rx = self.bus.subscribe();
        let cancel = self.cancel.child_token();
        let handle = tokio::spawn(run_listener(job_id, bus_rx, sender.clone(), cancel.clone()));
        let id = self.next_topic_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(job_id, "Progress listener started");
        topics.insert(
            job_id,
            Topic {
                id,
                sender,
                subscribers: 1,
                cancel,
                handle,
            },
        );

        drop(topics);
        self.handle(job_id, id, receiver)
    }

    fn handle(&self, job_id: DbId, topic_id: u64, receiver: broadcast::Receiver<ProgressEvent>) -> Subscription {
        Subscription {
            job_id,
            topic_id,
            receiver,
            topics: Arc::downgrade(&self.topics),
        }
    }

    /// Release a subscription. The job's listener stops when its last
    /// subscriber leaves. Unsubscribing when no listener exists is a no-op.
    pub async fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Subscribe, wait for exactly one event or `timeout`, then unsubscribe.
    ///
    /// Cancelling the returned future also releases the subscription.
    pub async fn listen_once(&self, job_id: DbId, timeout: Duration) -> Option<ProgressEvent> {
        let mut subscription = self.subscribe(job_id).await;
        tokio::time::timeout(timeout, subscription.recv())
            .await
            .ok()
            .flatten()
    }

    /// Number of jobs with an active listener task.
    pub async fn listener_count(&self) -> usize {
        lock(&self.topics).len()
    }

    /// Cancel every listener task and wait for them to exit.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down progress hub");
        self.cancel.cancel();

        let drained: Vec<(DbId, Topic)> = lock(&self.topics).drain().collect();
        for (job_id, topic) in drained {
            topic.cancel.cancel();
            if tokio::time::timeout(LISTENER_STOP_TIMEOUT, topic.handle)
                .await
                .is_err()
            {
                tracing::warn!(job_id, "Progress listener did not stop in time");
            }
        }

        tracing::info!("Progress hub shut down complete");
    }
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new(EventBus::default())
    }
}

/// Forward bus events for `job_id` into the per-job channel until cancelled.
async fn run_listener(
    job_id: DbId,
    mut bus_rx: broadcast::Receiver<ProgressEvent>,
    sender: broadcast::Sender<ProgressEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = bus_rx.recv() => match received {
                Ok(event) if event.job_id == job_id => {
                    // Zero receivers only means every subscriber is mid-unsubscribe.
                    let _ = sender.send(event);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(job_id, skipped, "Progress listener lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}
