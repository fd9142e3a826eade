//! Shared fakes for integration tests: scripted push transports and stores
//! that fail on demand.

#![allow(dead_code)]

use async_trait::async_trait;
use chat_fanout::{
    error::{AppError, Result},
    fanout::{PushError, PushTransport},
    models::{ConnectionRecord, Message},
    state::{ConnectionStore, InMemoryStore, MessageStore},
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn record(id: &str, user_id: &str, name: &str) -> ConnectionRecord {
    ConnectionRecord::new(
        id,
        Some(user_id.to_string()),
        Some(name.to_string()),
        Duration::hours(24),
    )
}

pub fn message(body: &str) -> Message {
    Message::new(
        "general".to_string(),
        "u1".to_string(),
        "Alice".to_string(),
        body.to_string(),
        "c1".to_string(),
        Duration::days(30),
    )
}

/// Push transport answering from fixed sets of gone and failing peers
#[derive(Default)]
pub struct ScriptedTransport {
    gone: HashSet<String>,
    transient: HashSet<String>,
    delay: Option<std::time::Duration>,
    pushes: Mutex<Vec<(String, Vec<u8>)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gone(mut self, connection_id: &str) -> Self {
        self.gone.insert(connection_id.to_string());
        self
    }

    pub fn with_transient(mut self, connection_id: &str) -> Self {
        self.transient.insert(connection_id.to_string());
        self
    }

    /// Every push sleeps for `delay` before answering
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_count(&self) -> usize {
        self.pushes.lock().len()
    }

    pub fn pushes(&self) -> Vec<(String, Vec<u8>)> {
        self.pushes.lock().clone()
    }
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn push(&self, connection_id: &str, payload: &[u8]) -> std::result::Result<(), PushError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.pushes
            .lock()
            .push((connection_id.to_string(), payload.to_vec()));

        if self.gone.contains(connection_id) {
            Err(PushError::Gone)
        } else if self.transient.contains(connection_id) {
            Err(PushError::Transient("throttled".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Message store that counts appends and optionally fails them
#[derive(Default)]
pub struct CountingMessageStore {
    inner: InMemoryStore,
    fail: bool,
    appends: AtomicUsize,
}

impl CountingMessageStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn appends(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> usize {
        self.inner.message_count()
    }
}

#[async_trait]
impl MessageStore for CountingMessageStore {
    async fn append_message(&self, message: &Message) -> Result<()> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::Storage("store unavailable".to_string()));
        }
        self.inner.append_message(message).await
    }

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>> {
        self.inner.get_message(message_id).await
    }

    async fn purge_expired_messages(&self, now: DateTime<Utc>) -> Result<usize> {
        self.inner.purge_expired_messages(now).await
    }
}

/// Connection store whose deletes always fail
#[derive(Default)]
pub struct UndeletableConnectionStore {
    inner: InMemoryStore,
}

#[async_trait]
impl ConnectionStore for UndeletableConnectionStore {
    async fn put_connection(&self, record: &ConnectionRecord) -> Result<()> {
        self.inner.put_connection(record).await
    }

    async fn get_connection(&self, connection_id: &str) -> Result<Option<ConnectionRecord>> {
        self.inner.get_connection(connection_id).await
    }

    async fn delete_connection(&self, _connection_id: &str) -> Result<()> {
        Err(AppError::Storage("delete rejected".to_string()))
    }

    async fn scan_connections(&self) -> Result<Vec<ConnectionRecord>> {
        self.inner.scan_connections().await
    }

    async fn purge_expired_connections(&self, now: DateTime<Utc>) -> Result<usize> {
        self.inner.purge_expired_connections(now).await
    }
}
