use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::ws::Message;
use genhub_core::types::{DbId, Timestamp};
use genhub_events::{EventSink, ProgressEvent};
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// The live connection tracked for one job.
pub struct WsConnection {
    /// Distinguishes a replaced registration from its successor.
    pub conn_id: u64,
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

/// What [`WsManager::connect`] hands back to the socket task.
pub struct WsRegistration {
    pub conn_id: u64,
    /// Sender for replies the socket task writes itself (heartbeat pongs).
    pub sender: WsSender,
    pub receiver: mpsc::UnboundedReceiver<Message>,
}

/// Tracks at most one live connection per job and pushes job events to it.
///
/// Delivery is best-effort: a failed send drops the registration and later
/// sends for that job are no-ops. `complete` and `error` events always end
/// the registration.
pub struct WsManager {
    connections: RwLock<HashMap<DbId, WsConnection>>,
    next_conn_id: AtomicU64,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Register the live connection for `job_id`, replacing any earlier one.
    ///
    /// The replaced connection is not closed; it simply stops receiving.
    pub async fn connect(&self, job_id: DbId) -> WsRegistration {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let conn = WsConnection {
            conn_id,
            sender: tx.clone(),
            connected_at: chrono::Utc::now(),
        };
        let replaced = self.connections.write().await.insert(job_id, conn);
        if replaced.is_some() {
            tracing::debug!(job_id, conn_id, "WebSocket registration replaced");
        }
        WsRegistration {
            conn_id,
            sender: tx,
            receiver: rx,
        }
    }

    /// Stop tracking the connection for `job_id`. Unknown ids are a no-op.
    pub async fn disconnect(&self, job_id: DbId) {
        self.connections.write().await.remove(&job_id);
    }

    /// Remove the registration only if it is still `conn_id`.
    pub async fn release(&self, job_id: DbId, conn_id: u64) {
        let mut conns = self.connections.write().await;
        if conns.get(&job_id).is_some_and(|c| c.conn_id == conn_id) {
            conns.remove(&job_id);
        }
    }

    pub async fn is_connected(&self, job_id: DbId) -> bool {
        self.connections.read().await.contains_key(&job_id)
    }

    pub async fn send_progress(&self, job_id: DbId, percent: f64, message: &str) {
        self.deliver(&ProgressEvent::progress(job_id, percent, message))
            .await;
    }

    pub async fn send_complete(&self, job_id: DbId, data: Value) {
        self.deliver(&ProgressEvent::complete(job_id, data)).await;
    }

    pub async fn send_error(&self, job_id: DbId, message: &str) {
        self.deliver(&ProgressEvent::error(job_id, message)).await;
    }

    /// Push one event to the job's connection, if any.
    async fn deliver(&self, event: &ProgressEvent) {
        let job_id = event.job_id;
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(job_id, error = %e, "Failed to encode job event");
                return;
            }
        };

        let mut conns = self.connections.write().await;
        let Some(conn) = conns.get(&job_id) else {
            return;
        };

        let sent = conn.sender.send(Message::Text(frame.into())).is_ok();
        if !sent {
            tracing::debug!(job_id, "WebSocket send failed, dropping connection");
        }
        if !sent || event.is_terminal() {
            conns.remove(&job_id);
        }
    }

    /// Return the current number of tracked connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for WsManager {
    async fn emit(&self, event: &ProgressEvent) {
        self.deliver(event).await;
    }
}
