//! End-to-end WebSocket tests against a served router.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

async fn serve() -> (SocketAddr, common::TestApp) {
    let t = common::build_test_app();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = t.app.clone();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    (addr, t)
}

async fn next_json<S>(stream: &mut S) -> Value
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("frame before timeout")
            .expect("stream open")
            .expect("valid frame");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

// ---------------------------------------------------------------------------
// Test: inbound text gets a heartbeat reply, job events are pushed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn socket_answers_heartbeat_and_receives_job_events() {
    let (addr, t) = serve().await;
    let url = format!("ws://{addr}/api/v1/ws/generation/11");
    let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    socket.send(Message::Text("ping".into())).await.unwrap();
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "heartbeat");
    assert_eq!(reply["message"], "pong");

    // The heartbeat reply proves the connection is registered.
    assert!(t.state.ws_manager.is_connected(11).await);

    t.state.ws_manager.send_progress(11, 50.0, "halfway").await;
    let progress = next_json(&mut socket).await;
    assert_eq!(progress["type"], "progress");
    assert_eq!(progress["progress"], 50.0);

    t.state
        .ws_manager
        .send_complete(11, serde_json::json!({"seed": 42}))
        .await;
    let complete = next_json(&mut socket).await;
    assert_eq!(complete["type"], "complete");
    assert_eq!(complete["data"]["seed"], 42);
    assert!(!t.state.ws_manager.is_connected(11).await);
}

// ---------------------------------------------------------------------------
// Test: closing the socket releases the registration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn closing_the_socket_releases_the_connection() {
    let (addr, t) = serve().await;
    let url = format!("ws://{addr}/api/v1/ws/generation/12");
    let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    socket.send(Message::Text("hello".into())).await.unwrap();
    next_json(&mut socket).await;
    assert!(t.state.ws_manager.is_connected(12).await);

    socket.close(None).await.unwrap();

    let released = tokio::time::timeout(Duration::from_secs(5), async {
        while t.state.ws_manager.is_connected(12).await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "connection was not released after close");
}
