//! WebSocket chat endpoint
//!
//! Wires the live socket map, the connection registry, the fanout engine and
//! the ingestor together behind the `/ws` endpoint.
//!
//! - **Messages**: wire frames exchanged with clients
//! - **Connection**: live socket writers, the production push transport
//! - **Server**: socket upgrade, read loop, heartbeat and cleanup

pub mod connection;
pub mod messages;
pub mod server;

use axum::extract::ws::Message as Frame;
use chrono::Duration;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::fanout::{ConnectionRegistry, FanoutEngine};
use crate::ingest::MessageIngestor;
use crate::models::ConnectionRecord;
use crate::state::Stores;

pub use connection::LiveConnections;
pub use messages::{ClientMessage, ServerMessage};
pub use server::websocket_handler;

/// State shared by every socket task
pub struct ChatState {
    pub config: Config,
    pub connections: LiveConnections,
    pub registry: Arc<ConnectionRegistry>,
    pub engine: Arc<FanoutEngine>,
    pub ingestor: MessageIngestor,
    pub stores: Stores,
}

impl ChatState {
    pub fn new(config: Config, stores: Stores) -> Self {
        let connections = LiveConnections::new();
        let registry = Arc::new(ConnectionRegistry::new(stores.connections.clone()));
        let engine = Arc::new(FanoutEngine::new(
            registry.clone(),
            Arc::new(connections.clone()),
            config.fanout.delivery_timeout(),
        ));
        let ingestor = MessageIngestor::new(stores.messages.clone(), engine.clone(), config.ingest.clone());

        Self {
            config,
            connections,
            registry,
            engine,
            ingestor,
            stores,
        }
    }

    /// Register a newly opened socket and return its record and writer queue
    pub async fn connect(
        &self,
        connection_id: &str,
        user_id: Option<String>,
        username: Option<String>,
    ) -> Result<(ConnectionRecord, mpsc::UnboundedReceiver<Frame>)> {
        let record = ConnectionRecord::new(
            connection_id,
            user_id,
            username,
            Duration::seconds(self.config.ingest.connection_ttl_secs),
        );

        let rx = self.connections.attach(connection_id);
        if let Err(e) = self.registry.add(record.clone()).await {
            self.connections.detach(connection_id);
            return Err(e);
        }

        Ok((record, rx))
    }

    /// Tear down a socket that has closed
    pub async fn disconnect(&self, connection_id: &str) {
        self.connections.detach(connection_id);

        match self.registry.lookup(connection_id).await {
            Ok(Some(record)) => info!(
                connection_id = %connection_id,
                user_id = %record.user_id,
                "Connection closing"
            ),
            Ok(None) => info!(connection_id = %connection_id, "Connection already pruned"),
            Err(e) => warn!(connection_id = %connection_id, error = %e, "Lookup failed during disconnect"),
        }

        if let Err(e) = self.registry.remove(connection_id).await {
            warn!(connection_id = %connection_id, error = %e, "Failed to remove connection");
        }
    }
}
