//! Message ingest
//!
//! Validates an inbound frame, stamps it with identity and time, persists it,
//! and only then hands it to the fanout engine.

pub mod validation;

use chrono::Duration;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::config::IngestConfig;
use crate::fanout::{DeliveryReport, FanoutEngine};
use crate::metrics::{INGEST_REJECTIONS_TOTAL, MESSAGES_INGESTED_TOTAL};
use crate::models::{ConnectionRecord, Message};
use crate::state::MessageStore;

pub use validation::{parse_send_request, SendRequest, ValidationError};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to persist message: {0}")]
    PersistFailed(String),
}

/// Result of a successful ingest
#[derive(Debug, Clone)]
pub struct Ingested {
    pub message: Message,
    /// `None` when the broadcast could not be started
    pub report: Option<DeliveryReport>,
}

pub struct MessageIngestor {
    messages: Arc<dyn MessageStore>,
    engine: Arc<FanoutEngine>,
    config: IngestConfig,
}

impl MessageIngestor {
    pub fn new(messages: Arc<dyn MessageStore>, engine: Arc<FanoutEngine>, config: IngestConfig) -> Self {
        Self {
            messages,
            engine,
            config,
        }
    }

    /// Accept one raw frame from `origin`.
    ///
    /// Succeeds once the message is persisted; delivery failures are reported
    /// but never turn into an error.
    pub async fn ingest(&self, raw: &str, origin: &ConnectionRecord) -> Result<Ingested, IngestError> {
        let message = self.accept(raw, origin).inspect_err(|e| {
            INGEST_REJECTIONS_TOTAL.with_label_values(&[e.reason()]).inc();
            debug!(connection_id = %origin.connection_id, error = %e, "Rejected inbound message");
        })?;

        if let Err(e) = self.messages.append_message(&message).await {
            INGEST_REJECTIONS_TOTAL.with_label_values(&["persist_failed"]).inc();
            error!(message_id = %message.message_id, error = %e, "Failed to persist message");
            return Err(IngestError::PersistFailed(e.to_string()));
        }

        MESSAGES_INGESTED_TOTAL.inc();
        info!(
            message_id = %message.message_id,
            room_id = %message.room_id,
            connection_id = %origin.connection_id,
            "Message accepted"
        );

        let report = match self.engine.registry().snapshot().await {
            Ok(snapshot) => match self.engine.broadcast(&message, &snapshot).await {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(message_id = %message.message_id, error = %e, "Broadcast failed");
                    None
                }
            },
            Err(e) => {
                warn!(message_id = %message.message_id, error = %e, "Failed to snapshot registry");
                None
            }
        };

        Ok(Ingested { message, report })
    }

    fn accept(&self, raw: &str, origin: &ConnectionRecord) -> Result<Message, ValidationError> {
        let request = parse_send_request(raw, self.config.max_message_length)?;

        let message = Message::new(
            request.room_id.unwrap_or_else(|| self.config.default_room.clone()),
            origin.user_id.clone(),
            request.username,
            request.body,
            origin.connection_id.clone(),
            Duration::seconds(self.config.message_ttl_secs),
        );
        message.validate()?;

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::{ConnectionRegistry, PushError, PushTransport};
    use crate::state::InMemoryStore;
    use async_trait::async_trait;

    struct AlwaysDelivered;

    #[async_trait]
    impl PushTransport for AlwaysDelivered {
        async fn push(&self, _connection_id: &str, _payload: &[u8]) -> std::result::Result<(), PushError> {
            Ok(())
        }
    }

    fn ingestor(store: &InMemoryStore) -> MessageIngestor {
        let registry = Arc::new(ConnectionRegistry::new(Arc::new(store.clone())));
        let engine = Arc::new(FanoutEngine::new(
            registry,
            Arc::new(AlwaysDelivered),
            std::time::Duration::from_secs(1),
        ));
        MessageIngestor::new(Arc::new(store.clone()), engine, IngestConfig::default())
    }

    fn origin() -> ConnectionRecord {
        ConnectionRecord::new("c1", Some("u1".to_string()), Some("Alice".to_string()), Duration::hours(24))
    }

    #[tokio::test]
    async fn test_defaults_room_and_stamps_origin() {
        let store = InMemoryStore::new();
        let ingested = ingestor(&store)
            .ingest(r#"{"action":"sendMessage","message":"hi","username":"Alice"}"#, &origin())
            .await
            .unwrap();

        assert_eq!(ingested.message.room_id, "general");
        assert_eq!(ingested.message.sender_user_id, "u1");
        assert_eq!(ingested.message.origin_connection_id, "c1");
        assert!(ingested.message.message_id.starts_with("general-"));
        assert_eq!(store.message_count(), 1);
    }

    #[tokio::test]
    async fn test_overlong_username_is_invalid() {
        let store = InMemoryStore::new();
        let raw = format!(
            r#"{{"action":"sendMessage","message":"hi","username":"{}"}}"#,
            "a".repeat(101)
        );
        let err = ingestor(&store).ingest(&raw, &origin()).await.unwrap_err();

        assert!(matches!(err, IngestError::Validation(ValidationError::Invalid(_))));
        assert_eq!(store.message_count(), 0);
    }
}
