use crate::error::{AppError, Result};
use crate::models::{ConnectionRecord, Message};
use crate::state::{ConnectionStore, MessageStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use serde::{de::DeserializeOwned, Serialize};

/// Drop an id from the index only while its record key is still absent
const PRUNE_INDEX_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return redis.call('SREM', KEYS[2], ARGV[1])
end
return 0
"#;

/// Redis-backed record store; expiry is delegated to Redis key TTLs
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    key_prefix: String,
    prune_index: Script,
}

impl RedisStore {
    /// Create a new Redis store with custom key prefix
    pub async fn new_with_prefix(redis_url: &str, prefix: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            AppError::Storage(format!("Failed to create Redis client: {}", e))
        })?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to connect to Redis: {}", e)))?;

        let mut test_conn = connection.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut test_conn)
            .await
            .map_err(|e| AppError::Storage(format!("Redis connection test failed: {}", e)))?;

        tracing::info!("Initialized Redis store with prefix '{}'", prefix);

        Ok(Self {
            connection,
            key_prefix: prefix.to_string(),
            prune_index: Script::new(PRUNE_INDEX_SCRIPT),
        })
    }

    fn connection_key(&self, connection_id: &str) -> String {
        format!("{}:connection:{}", self.key_prefix, connection_id)
    }

    /// Set of every registered connection id
    fn connections_set_key(&self) -> String {
        format!("{}:connections", self.key_prefix)
    }

    fn message_key(&self, message_id: &str) -> String {
        format!("{}:message:{}", self.key_prefix, message_id)
    }

    fn encode<T: Serialize>(value: &T) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode<T: DeserializeOwned>(json: &str) -> Result<T> {
        Ok(serde_json::from_str(json)?)
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl_secs: u64) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", key, e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to read {}: {}", key, e)))?;

        value.as_deref().map(|json| Self::decode::<T>(json)).transpose()
    }

    /// Remove a dangling id from the connections index. A record re-put since
    /// it was found missing keeps its entry.
    async fn prune_dangling(&self, connection_id: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let removed: i64 = self
            .prune_index
            .key(self.connection_key(connection_id))
            .key(self.connections_set_key())
            .arg(connection_id)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to update connections set: {}", e)))?;
        Ok(removed > 0)
    }
}

#[async_trait]
impl ConnectionStore for RedisStore {
    async fn put_connection(&self, record: &ConnectionRecord) -> Result<()> {
        let key = self.connection_key(&record.connection_id);
        let ttl = record.ttl_seconds(Utc::now());
        self.set_with_ttl(&key, Self::encode(record)?, ttl).await?;

        let mut conn = self.connection.clone();
        let _: () = conn
            .sadd(self.connections_set_key(), &record.connection_id)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to update connections set: {}", e)))?;

        tracing::debug!(connection_id = %record.connection_id, "Connection saved to Redis");
        Ok(())
    }

    async fn get_connection(&self, connection_id: &str) -> Result<Option<ConnectionRecord>> {
        self.get_json(&self.connection_key(connection_id)).await
    }

    async fn delete_connection(&self, connection_id: &str) -> Result<()> {
        let mut conn = self.connection.clone();

        let _: () = conn
            .del(self.connection_key(connection_id))
            .await
            .map_err(|e| AppError::Storage(format!("Failed to delete connection: {}", e)))?;

        let _: () = conn
            .srem(self.connections_set_key(), connection_id)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to update connections set: {}", e)))?;

        tracing::debug!(connection_id = %connection_id, "Connection deleted from Redis");
        Ok(())
    }

    async fn scan_connections(&self) -> Result<Vec<ConnectionRecord>> {
        let mut conn = self.connection.clone();
        let ids: Vec<String> = conn
            .smembers(self.connections_set_key())
            .await
            .map_err(|e| AppError::Storage(format!("Failed to read connections set: {}", e)))?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| self.connection_key(id)).collect();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to read connections: {}", e)))?;

        let mut records = Vec::with_capacity(values.len());
        for (id, value) in ids.iter().zip(values) {
            match value {
                Some(json) => records.push(Self::decode(&json)?),
                // Key expired under its TTL
                None => {
                    self.prune_dangling(id).await?;
                }
            }
        }

        Ok(records)
    }

    async fn purge_expired_connections(&self, _now: DateTime<Utc>) -> Result<usize> {
        let before: usize = {
            let mut conn = self.connection.clone();
            conn.scard(self.connections_set_key())
                .await
                .map_err(|e| AppError::Storage(format!("Failed to count connections: {}", e)))?
        };
        let live = self.scan_connections().await?.len();
        Ok(before.saturating_sub(live))
    }
}

#[async_trait]
impl MessageStore for RedisStore {
    async fn append_message(&self, message: &Message) -> Result<()> {
        let key = self.message_key(&message.message_id);
        let ttl = message.ttl_seconds(Utc::now());
        self.set_with_ttl(&key, Self::encode(message)?, ttl).await?;

        tracing::debug!(message_id = %message.message_id, "Message saved to Redis");
        Ok(())
    }

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>> {
        self.get_json(&self.message_key(message_id)).await
    }

    async fn purge_expired_messages(&self, _now: DateTime<Utc>) -> Result<usize> {
        // Message keys carry their own TTL
        Ok(0)
    }
}
