use crate::error::{AppError, Result};
use crate::models::{ConnectionRecord, Message};
use crate::state::{ConnectionStore, MessageStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sled::Db;
use std::path::Path;
use std::sync::Arc;

/// Persistent record store using the Sled embedded database
#[derive(Clone)]
pub struct SledStore {
    db: Arc<Db>,
    connections_tree: sled::Tree,
    messages_tree: sled::Tree,
}

impl SledStore {
    /// Create a new Sled store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref();
        let db = sled::open(&path).map_err(|e| {
            AppError::Storage(format!("Failed to open Sled database: {}", e))
        })?;

        let connections_tree = db.open_tree("connections").map_err(|e| {
            AppError::Storage(format!("Failed to open connections tree: {}", e))
        })?;

        let messages_tree = db.open_tree("messages").map_err(|e| {
            AppError::Storage(format!("Failed to open messages tree: {}", e))
        })?;

        tracing::info!("Initialized Sled store at {:?}", path_str);

        Ok(Self {
            db: Arc::new(db),
            connections_tree,
            messages_tree,
        })
    }

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn get_from<T: DeserializeOwned>(tree: &sled::Tree, key: &str) -> Result<Option<T>> {
        match tree.get(key.as_bytes()) {
            Ok(Some(bytes)) => Ok(Some(Self::decode(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(AppError::Storage(format!("Failed to read record: {}", e))),
        }
    }

    /// Remove every value in `tree` for which `expired` holds
    fn purge_tree<T, F>(tree: &sled::Tree, expired: F) -> Result<usize>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let mut stale = Vec::new();
        for entry in tree.iter() {
            let (key, value) = entry.map_err(|e| {
                AppError::Storage(format!("Failed to iterate records: {}", e))
            })?;
            let record: T = Self::decode(&value)?;
            if expired(&record) {
                stale.push(key);
            }
        }

        for key in &stale {
            tree.remove(key).map_err(|e| {
                AppError::Storage(format!("Failed to remove expired record: {}", e))
            })?;
        }

        Ok(stale.len())
    }
}

#[async_trait]
impl ConnectionStore for SledStore {
    async fn put_connection(&self, record: &ConnectionRecord) -> Result<()> {
        let value = Self::encode(record)?;

        self.connections_tree
            .insert(record.connection_id.as_bytes(), value)
            .map_err(|e| AppError::Storage(format!("Failed to save connection: {}", e)))?;

        tracing::debug!(connection_id = %record.connection_id, "Connection saved to Sled");
        Ok(())
    }

    async fn get_connection(&self, connection_id: &str) -> Result<Option<ConnectionRecord>> {
        Self::get_from(&self.connections_tree, connection_id)
    }

    async fn delete_connection(&self, connection_id: &str) -> Result<()> {
        let removed = self
            .connections_tree
            .remove(connection_id.as_bytes())
            .map_err(|e| AppError::Storage(format!("Failed to delete connection: {}", e)))?;

        if removed.is_some() {
            tracing::debug!(connection_id = %connection_id, "Connection deleted from Sled");
        }
        Ok(())
    }

    async fn scan_connections(&self) -> Result<Vec<ConnectionRecord>> {
        let mut records = Vec::new();
        for entry in self.connections_tree.iter() {
            let (_, value) = entry.map_err(|e| {
                AppError::Storage(format!("Failed to iterate connections: {}", e))
            })?;
            records.push(Self::decode(&value)?);
        }
        Ok(records)
    }

    async fn purge_expired_connections(&self, now: DateTime<Utc>) -> Result<usize> {
        Self::purge_tree(&self.connections_tree, |record: &ConnectionRecord| {
            record.is_expired(now)
        })
    }
}

#[async_trait]
impl MessageStore for SledStore {
    async fn append_message(&self, message: &Message) -> Result<()> {
        let value = Self::encode(message)?;

        self.messages_tree
            .insert(message.message_id.as_bytes(), value)
            .map_err(|e| AppError::Storage(format!("Failed to save message: {}", e)))?;

        // Must be on disk before the message is broadcast
        self.messages_tree.flush_async().await.map_err(|e| {
            AppError::Storage(format!("Failed to flush messages tree: {}", e))
        })?;

        tracing::debug!(message_id = %message.message_id, "Message saved to Sled");
        Ok(())
    }

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>> {
        Self::get_from(&self.messages_tree, message_id)
    }

    async fn purge_expired_messages(&self, now: DateTime<Utc>) -> Result<usize> {
        Self::purge_tree(&self.messages_tree, |message: &Message| message.is_expired(now))
    }
}
