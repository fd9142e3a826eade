use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::stream::StreamExt;
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{connection::MessageWriter, messages::ServerMessage, ChatState};
use crate::error::AppError;
use crate::models::ConnectionRecord;

/// Identity carried on the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub username: Option<String>,
}

/// WebSocket endpoint handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ChatState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(params): Query<ConnectParams>,
) -> Response {
    info!(remote_addr = %addr, "WebSocket connection request");

    ws.on_upgrade(move |socket| handle_socket(socket, state, addr, params))
}

async fn handle_socket(socket: WebSocket, state: Arc<ChatState>, addr: SocketAddr, params: ConnectParams) {
    let connection_id = Uuid::new_v4().to_string();
    let (sender, mut receiver) = socket.split();
    let mut writer = MessageWriter::new(sender);

    let (record, mut frames) = match state.connect(&connection_id, params.user_id, params.username).await {
        Ok(registered) => registered,
        Err(e) => {
            error!(connection_id = %connection_id, error = %e, "Failed to register connection");
            let _ = writer.close().await;
            return;
        }
    };

    info!(
        connection_id = %connection_id,
        remote_addr = %addr,
        user_id = %record.user_id,
        "WebSocket session started"
    );

    // Ends once the socket is detached and the queue drains
    let writer_id = connection_id.clone();
    let writer_handle = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if let Err(e) = writer.send(frame).await {
                debug!(connection_id = %writer_id, error = ?e, "Socket write failed");
                break;
            }
        }
        let _ = writer.close().await;
    });

    let heartbeat_id = connection_id.clone();
    let heartbeat_connections = state.connections.clone();
    let period = Duration::from_secs(state.config.fanout.heartbeat_interval_secs.max(1));
    let heartbeat_handle = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            if !heartbeat_connections.ping(&heartbeat_id) {
                debug!(connection_id = %heartbeat_id, "Heartbeat stopped, socket gone");
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                warn!(connection_id = %connection_id, error = ?e, "WebSocket error");
                break;
            }
        };

        match msg {
            Message::Text(text) => handle_text(&state, &record, &text).await,
            Message::Binary(_) => {
                reply(
                    &state,
                    &connection_id,
                    ServerMessage::error("UNSUPPORTED", "Binary messages are not supported"),
                );
            }
            Message::Ping(_) | Message::Pong(_) => {
                debug!(connection_id = %connection_id, "Control frame received");
            }
            Message::Close(frame) => {
                info!(
                    connection_id = %connection_id,
                    code = frame.as_ref().map(|f| f.code),
                    "Client closed connection"
                );
                break;
            }
        }
    }

    heartbeat_handle.abort();
    state.disconnect(&connection_id).await;
    let _ = writer_handle.await;

    info!(connection_id = %connection_id, "WebSocket session ended");
}

async fn handle_text(state: &ChatState, origin: &ConnectionRecord, text: &str) {
    if let Err(e) = state.ingestor.ingest(text, origin).await {
        let e = AppError::from(e);
        reply(
            state,
            &origin.connection_id,
            ServerMessage::error(e.error_code(), e.to_string()),
        );
    }
}

fn reply(state: &ChatState, connection_id: &str, message: ServerMessage) {
    if let Err(e) = state.connections.send_to(connection_id, &message) {
        debug!(connection_id = %connection_id, error = %e, "Failed to send reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::create_in_memory_stores;

    #[test]
    fn test_connect_params_use_query_names() {
        let params: ConnectParams = serde_json::from_str(r#"{"userId":"u1","username":"Alice"}"#).unwrap();
        assert_eq!(params.user_id.as_deref(), Some("u1"));
        assert_eq!(params.username.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_rejection_replies_to_origin_only() {
        let state = ChatState::new(Config::default(), create_in_memory_stores());
        let (alice, mut alice_rx) = state.connect("c1", Some("u1".to_string()), None).await.unwrap();
        let (_bob, mut bob_rx) = state.connect("c2", Some("u2".to_string()), None).await.unwrap();

        handle_text(&state, &alice, r#"{"action":"sendMessage","message":"","username":"Alice"}"#).await;

        match alice_rx.recv().await.unwrap() {
            Message::Text(text) => {
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(value["type"], "error");
                assert_eq!(value["code"], "VALIDATION_ERROR");
            }
            other => panic!("unexpected frame: {:?}", other),
        }
        assert!(bob_rx.try_recv().is_err());
    }
}
