use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use genhub_core::job_events::MSG_TYPE_HEARTBEAT;
use genhub_core::types::DbId;
use serde_json::json;

use crate::state::AppState;
use crate::ws::manager::WsManager;

/// GET /api/v1/ws/generation/{id}
///
/// Upgrades to a WebSocket that receives the job's progress events.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(job_id): Path<DbId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, job_id, state.ws_manager))
}

fn heartbeat_frame() -> Message {
    let body = json!({ "type": MSG_TYPE_HEARTBEAT, "message": "pong" });
    Message::Text(body.to_string().into())
}

/// Manage a single job connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection for `job_id` with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Answers every inbound text frame with a heartbeat.
///   4. Releases the registration on disconnect.
async fn handle_socket(socket: WebSocket, job_id: DbId, ws_manager: Arc<WsManager>) {
    let registration = ws_manager.connect(job_id).await;
    let conn_id = registration.conn_id;
    let replies = registration.sender;
    let mut rx = registration.receiver;
    tracing::info!(job_id, conn_id, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(job_id, conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Text(_)) => {
                if replies.send(heartbeat_frame()).is_err() {
                    break;
                }
            }
            Ok(Message::Pong(_)) => {
                tracing::trace!(job_id, conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(job_id, conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    ws_manager.release(job_id, conn_id).await;
    send_task.abort();
    tracing::info!(job_id, conn_id, "WebSocket disconnected");
}
