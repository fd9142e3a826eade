//! Message ingest: validation short-circuit, persistence gate, hand-off to fanout

mod common;

use chat_fanout::config::IngestConfig;
use chat_fanout::fanout::{ConnectionRegistry, FanoutEngine};
use chat_fanout::ingest::{IngestError, MessageIngestor, ValidationError};
use chat_fanout::state::InMemoryStore;
use common::{record, CountingMessageStore, ScriptedTransport};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    registry: Arc<ConnectionRegistry>,
    transport: Arc<ScriptedTransport>,
    messages: Arc<CountingMessageStore>,
    ingestor: MessageIngestor,
}

async fn harness(messages: CountingMessageStore, transport: ScriptedTransport) -> Harness {
    let registry = Arc::new(ConnectionRegistry::new(Arc::new(InMemoryStore::new())));
    registry.add(record("c1", "u1", "Alice")).await.unwrap();
    registry.add(record("c2", "u2", "Bob")).await.unwrap();

    let transport = Arc::new(transport);
    let messages = Arc::new(messages);
    let engine = Arc::new(FanoutEngine::new(registry.clone(), transport.clone(), Duration::from_secs(5)));
    let ingestor = MessageIngestor::new(messages.clone(), engine, IngestConfig::default());

    Harness {
        registry,
        transport,
        messages,
        ingestor,
    }
}

#[tokio::test]
async fn test_empty_body_short_circuits() {
    let h = harness(CountingMessageStore::default(), ScriptedTransport::new()).await;
    let origin = h.registry.lookup("c1").await.unwrap().unwrap();

    let err = h
        .ingestor
        .ingest(r#"{"action":"sendMessage","message":"","username":"Alice"}"#, &origin)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IngestError::Validation(ValidationError::MissingField("message"))
    ));
    assert_eq!(h.messages.appends(), 0);
    assert_eq!(h.transport.push_count(), 0);
}

#[tokio::test]
async fn test_overlong_body_is_rejected() {
    let h = harness(CountingMessageStore::default(), ScriptedTransport::new()).await;
    let origin = h.registry.lookup("c1").await.unwrap().unwrap();
    let raw = format!(
        r#"{{"action":"sendMessage","message":"{}","username":"Alice"}}"#,
        "x".repeat(1001)
    );

    let err = h.ingestor.ingest(&raw, &origin).await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::Validation(ValidationError::TooLong { max: 1000, .. })
    ));
    assert_eq!(h.messages.appends(), 0);
}

#[tokio::test]
async fn test_persist_failure_skips_broadcast() {
    let h = harness(CountingMessageStore::failing(), ScriptedTransport::new()).await;
    let origin = h.registry.lookup("c1").await.unwrap().unwrap();

    let err = h
        .ingestor
        .ingest(r#"{"action":"sendMessage","message":"hi","username":"Alice"}"#, &origin)
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::PersistFailed(_)));
    assert_eq!(h.messages.appends(), 1);
    assert_eq!(h.transport.push_count(), 0);
}

#[tokio::test]
async fn test_accepted_message_is_stored_then_broadcast() {
    let h = harness(CountingMessageStore::default(), ScriptedTransport::new()).await;
    let origin = h.registry.lookup("c1").await.unwrap().unwrap();

    let ingested = h
        .ingestor
        .ingest(
            r#"{"action":"sendMessage","message":" hello ","username":"Alice","roomId":"general"}"#,
            &origin,
        )
        .await
        .unwrap();

    assert_eq!(ingested.message.body, "hello");
    assert_eq!(ingested.message.sender_name, "Alice");
    assert_eq!(h.messages.stored(), 1);

    let report = ingested.report.unwrap();
    assert_eq!(report.delivered, 2);

    let pushes = h.transport.pushes();
    assert_eq!(pushes.len(), 2);
    assert_eq!(pushes[0].1, pushes[1].1);
}

#[tokio::test]
async fn test_delivery_failures_do_not_fail_the_sender() {
    let transport = ScriptedTransport::new().with_gone("c2").with_transient("c1");
    let h = harness(CountingMessageStore::default(), transport).await;
    let origin = h.registry.lookup("c1").await.unwrap().unwrap();

    let ingested = h
        .ingestor
        .ingest(r#"{"action":"sendMessage","message":"hi","username":"Alice"}"#, &origin)
        .await
        .unwrap();

    let report = ingested.report.unwrap();
    assert_eq!(report.delivered, 0);
    assert_eq!(report.pruned, vec!["c2".to_string()]);
    assert_eq!(h.messages.stored(), 1);
    assert!(h.registry.lookup("c2").await.unwrap().is_none());
}
