/// WebSocket handler for streaming metric snapshots

use axum::{
    extract::ws::{Message, WebSocket},
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Serialize;
use tokio::time::interval;
use tracing::debug;

use super::handlers::current_snapshot;
use super::AppState;
use crate::core::metrics::MetricSnapshot;

#[derive(Serialize)]
struct SnapshotMessage<'a> {
    timestamp: i64,
    metrics: &'a MetricSnapshot,
}

/// WebSocket handler for real-time metrics streaming
pub async fn ws_metrics_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_metrics_websocket(socket, state))
}

async fn handle_metrics_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut interval = interval(state.stream_interval);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Some(snapshot) = current_snapshot(&state).await {
                    let message = SnapshotMessage {
                        timestamp: snapshot.collected_at().timestamp(),
                        metrics: &snapshot,
                    };

                    if let Ok(json) = serde_json::to_string(&message) {
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    debug!("Metrics WebSocket closed");
}
