pub mod store;
pub mod sled_store;
pub mod redis_store;
pub mod factory;

pub use store::*;
pub use sled_store::SledStore;
pub use redis_store::RedisStore;
pub use factory::{cleanup_task, create_in_memory_stores, create_stores, Stores};

use crate::error::Result;
use crate::models::{ConnectionRecord, Message};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Key-value persistence for connection records, keyed by connection id
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Insert or overwrite a record
    async fn put_connection(&self, record: &ConnectionRecord) -> Result<()>;

    /// Get a record by connection id
    async fn get_connection(&self, connection_id: &str) -> Result<Option<ConnectionRecord>>;

    /// Delete a record; deleting an absent id succeeds
    async fn delete_connection(&self, connection_id: &str) -> Result<()>;

    /// Return every stored record, unordered
    async fn scan_connections(&self) -> Result<Vec<ConnectionRecord>>;

    /// Drop records whose TTL has passed, returning how many were removed
    async fn purge_expired_connections(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// Append-only persistence for messages, keyed by message id
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Durably record a message
    async fn append_message(&self, message: &Message) -> Result<()>;

    /// Get a message by id
    async fn get_message(&self, message_id: &str) -> Result<Option<Message>>;

    /// Drop messages whose TTL has passed, returning how many were removed
    async fn purge_expired_messages(&self, now: DateTime<Utc>) -> Result<usize>;
}
