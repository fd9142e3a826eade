//! Two clients, one message, identical envelopes on both ends

use axum::extract::ws::Message as Frame;
use chat_fanout::{
    api::{build_router, AppState},
    client::{ChatSession, Identity, SessionStatus},
    config::{ClientConfig, Config},
    state::create_in_memory_stores,
    websocket::{ChatState, ServerMessage},
};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn chat_state() -> Arc<ChatState> {
    Arc::new(ChatState::new(Config::default(), create_in_memory_stores()))
}

async fn next_envelope(rx: &mut mpsc::UnboundedReceiver<Frame>) -> serde_json::Value {
    let frame = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no frame within 5s")
        .expect("writer channel closed");

    match frame {
        Frame::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("unexpected frame: {:?}", other),
    }
}

#[tokio::test]
async fn test_both_peers_receive_identical_envelope() {
    let state = chat_state();
    let (alice, mut alice_rx) = state
        .connect("conn-a", Some("u1".to_string()), Some("Alice".to_string()))
        .await
        .unwrap();
    let (_bob, mut bob_rx) = state
        .connect("conn-b", Some("u2".to_string()), Some("Bob".to_string()))
        .await
        .unwrap();

    let ingested = state
        .ingestor
        .ingest(
            r#"{"action":"sendMessage","message":"hello","username":"Alice","roomId":"general"}"#,
            &alice,
        )
        .await
        .unwrap();
    assert_eq!(ingested.report.unwrap().delivered, 2);

    let to_alice = next_envelope(&mut alice_rx).await;
    let to_bob = next_envelope(&mut bob_rx).await;

    assert_eq!(to_alice, to_bob);
    assert_eq!(to_alice["type"], "message");
    assert_eq!(to_alice["username"], "Alice");
    assert_eq!(to_alice["message"], "hello");
    assert_eq!(to_alice["roomId"], "general");
    assert_eq!(to_alice["messageId"], ingested.message.message_id.as_str());
    assert_eq!(to_alice["timestamp"], ingested.message.timestamp_millis());
}

#[tokio::test]
async fn test_closed_socket_is_pruned_on_next_broadcast() {
    let state = chat_state();
    let (alice, _alice_rx) = state.connect("conn-a", Some("u1".to_string()), None).await.unwrap();
    let (_bob, bob_rx) = state.connect("conn-b", Some("u2".to_string()), None).await.unwrap();

    // Bob's socket task died without a clean disconnect
    drop(bob_rx);

    let ingested = state
        .ingestor
        .ingest(r#"{"action":"sendMessage","message":"anyone?","username":"Alice"}"#, &alice)
        .await
        .unwrap();

    let report = ingested.report.unwrap();
    assert_eq!(report.pruned, vec!["conn-b".to_string()]);

    let snapshot = state.registry.snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.contains("conn-a"));
}

async fn wait_until<F: Fn() -> bool>(check: F) {
    timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sessions_over_real_sockets() {
    let state = chat_state();
    let app = build_router(AppState::new(state.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });

    let config = ClientConfig {
        url: format!("ws://{}/ws", addr),
        ..ClientConfig::default()
    };

    let alice = ChatSession::from_config(&config, Identity::new("u1", "Alice")).unwrap();
    let bob = ChatSession::from_config(&config, Identity::new("u2", "Bob")).unwrap();

    let alice_inbox = Arc::new(Mutex::new(Vec::new()));
    let bob_inbox = Arc::new(Mutex::new(Vec::new()));
    for (session, inbox) in [(&alice, &alice_inbox), (&bob, &bob_inbox)] {
        let inbox = inbox.clone();
        session.on_message(move |message| {
            if let ServerMessage::Message { .. } = message {
                inbox.lock().push(message.clone());
            }
        });
    }

    alice.start();
    bob.start();
    wait_until(|| alice.status() == SessionStatus::Connected && bob.status() == SessionStatus::Connected).await;

    let registry = state.registry.clone();
    timeout(Duration::from_secs(5), async {
        while registry.snapshot().await.unwrap().len() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("both sockets registered");

    alice.send("hello").unwrap();
    wait_until(|| !alice_inbox.lock().is_empty() && !bob_inbox.lock().is_empty()).await;

    let to_alice = alice_inbox.lock()[0].clone();
    let to_bob = bob_inbox.lock()[0].clone();
    assert_eq!(to_alice, to_bob);

    let ServerMessage::Message { username, message, .. } = to_alice else {
        panic!("expected a chat message");
    };
    assert_eq!(username, "Alice");
    assert_eq!(message, "hello");

    bob.disconnect();
    timeout(Duration::from_secs(5), async {
        while registry.snapshot().await.unwrap().len() > 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("bob unregistered after disconnect");
    assert_eq!(bob.status(), SessionStatus::Disconnected);
}
