use crate::error::Result;
use crate::models::{ConnectionRecord, Message};
use crate::state::{ConnectionStore, MessageStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory record store (for development and testing)
#[derive(Clone, Default)]
pub struct InMemoryStore {
    connections: Arc<DashMap<String, ConnectionRecord>>,
    messages: Arc<DashMap<String, Message>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored connection records
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of stored messages
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

#[async_trait]
impl ConnectionStore for InMemoryStore {
    async fn put_connection(&self, record: &ConnectionRecord) -> Result<()> {
        self.connections
            .insert(record.connection_id.clone(), record.clone());
        tracing::debug!(connection_id = %record.connection_id, "Connection record stored");
        Ok(())
    }

    async fn get_connection(&self, connection_id: &str) -> Result<Option<ConnectionRecord>> {
        Ok(self
            .connections
            .get(connection_id)
            .map(|entry| entry.value().clone()))
    }

    async fn delete_connection(&self, connection_id: &str) -> Result<()> {
        if self.connections.remove(connection_id).is_some() {
            tracing::debug!(connection_id = %connection_id, "Connection record deleted");
        }
        Ok(())
    }

    async fn scan_connections(&self) -> Result<Vec<ConnectionRecord>> {
        Ok(self
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn purge_expired_connections(&self, now: DateTime<Utc>) -> Result<usize> {
        let before = self.connections.len();
        self.connections.retain(|_, record| !record.is_expired(now));
        Ok(before.saturating_sub(self.connections.len()))
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn append_message(&self, message: &Message) -> Result<()> {
        self.messages
            .insert(message.message_id.clone(), message.clone());
        tracing::debug!(message_id = %message.message_id, "Message stored");
        Ok(())
    }

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>> {
        Ok(self
            .messages
            .get(message_id)
            .map(|entry| entry.value().clone()))
    }

    async fn purge_expired_messages(&self, now: DateTime<Utc>) -> Result<usize> {
        let before = self.messages.len();
        self.messages.retain(|_, message| !message.is_expired(now));
        Ok(before.saturating_sub(self.messages.len()))
    }
}
