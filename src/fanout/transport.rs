use async_trait::async_trait;
use thiserror::Error;

/// Why a push to one peer did not land
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PushError {
    /// The peer is permanently unreachable (HTTP 410 semantics)
    #[error("Peer is gone")]
    Gone,

    /// Any other failure; the peer may be reachable on a later push
    #[error("Transient delivery failure: {0}")]
    Transient(String),
}

/// Delivers an opaque payload to a single connection
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn push(&self, connection_id: &str, payload: &[u8]) -> Result<(), PushError>;
}
