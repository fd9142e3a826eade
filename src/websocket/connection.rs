//! Live WebSocket connections
//!
//! In-process map from connection id to the writer channel of an open socket.
//! This is the production [`PushTransport`]: a missing or closed writer means
//! the peer is gone.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use futures::{stream::SplitSink, SinkExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::messages::ServerMessage;
use crate::fanout::{PushError, PushTransport};
use crate::metrics::CONNECTIONS_ACTIVE;

/// Writer channels of every socket held by this process
#[derive(Clone, Default)]
pub struct LiveConnections {
    writers: Arc<DashMap<String, mpsc::UnboundedSender<Message>>>,
}

impl LiveConnections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a socket writer; returns the receiving half for the writer task
    pub fn attach(&self, connection_id: &str) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.writers.insert(connection_id.to_string(), tx).is_none() {
            CONNECTIONS_ACTIVE.inc();
        }
        info!(connection_id = %connection_id, "Socket attached");
        rx
    }

    pub fn detach(&self, connection_id: &str) {
        if self.writers.remove(connection_id).is_some() {
            CONNECTIONS_ACTIVE.dec();
            info!(connection_id = %connection_id, "Socket detached");
        }
    }

    pub fn count(&self) -> usize {
        self.writers.len()
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.writers.contains_key(connection_id)
    }

    /// Queue a server message for one connection
    pub fn send_to(&self, connection_id: &str, message: &ServerMessage) -> Result<(), PushError> {
        let json = serde_json::to_string(message).map_err(|e| PushError::Transient(e.to_string()))?;
        self.enqueue(connection_id, Message::Text(json))
    }

    /// Queue a ping frame; returns false once the socket is gone
    pub fn ping(&self, connection_id: &str) -> bool {
        self.enqueue(connection_id, Message::Ping(Vec::new())).is_ok()
    }

    fn enqueue(&self, connection_id: &str, frame: Message) -> Result<(), PushError> {
        let writer = self
            .writers
            .get(connection_id)
            .map(|entry| entry.value().clone())
            .ok_or(PushError::Gone)?;

        writer.send(frame).map_err(|_| {
            debug!(connection_id = %connection_id, "Writer channel closed");
            PushError::Gone
        })
    }
}

#[async_trait]
impl PushTransport for LiveConnections {
    async fn push(&self, connection_id: &str, payload: &[u8]) -> Result<(), PushError> {
        let text = std::str::from_utf8(payload).map_err(|e| PushError::Transient(e.to_string()))?;
        self.enqueue(connection_id, Message::Text(text.to_string()))
    }
}

/// Write half of a socket
pub struct MessageWriter {
    sink: SplitSink<WebSocket, Message>,
}

impl MessageWriter {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink }
    }

    pub async fn send(&mut self, frame: Message) -> Result<(), std::io::Error> {
        self.sink
            .send(frame)
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
    }

    pub async fn close(mut self) -> Result<(), std::io::Error> {
        self.sink
            .send(Message::Close(None))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
    }
}
