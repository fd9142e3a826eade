use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{
    registry::{ConnectionRegistry, RegistrySnapshot},
    report::{DeliveryOutcome, DeliveryReport},
    transport::{PushError, PushTransport},
};
use crate::error::Result;
use crate::metrics::{BROADCAST_DURATION_SECONDS, DELIVERIES_TOTAL, PEERS_PRUNED_TOTAL};
use crate::models::Message;
use crate::websocket::messages::ServerMessage;

/// Pushes a message to every peer in a registry snapshot
pub struct FanoutEngine {
    registry: Arc<ConnectionRegistry>,
    transport: Arc<dyn PushTransport>,
    delivery_timeout: Duration,
}

impl FanoutEngine {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        transport: Arc<dyn PushTransport>,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            transport,
            delivery_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Deliver `message` to every peer in `snapshot`, then prune the gone ones.
    ///
    /// Per-peer failures never fail the broadcast; the only error is a payload
    /// that cannot be serialized, in which case nothing is sent.
    pub async fn broadcast(
        &self,
        message: &Message,
        snapshot: &RegistrySnapshot,
    ) -> Result<DeliveryReport> {
        let started = Instant::now();
        let payload = serde_json::to_vec(&ServerMessage::from(message))?;

        let attempts = snapshot
            .iter()
            .map(|record| self.deliver(&record.connection_id, &payload));

        let mut report = DeliveryReport::new(message.message_id.clone());
        for (connection_id, outcome) in join_all(attempts).await {
            report.record(connection_id, outcome);
        }

        report.pruned = self.prune(&report.gone()).await;

        BROADCAST_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());
        info!(
            message_id = %message.message_id,
            peers = snapshot.len(),
            delivered = report.delivered,
            peer_gone = report.peer_gone,
            transient_errors = report.transient_errors,
            "Broadcast completed"
        );

        Ok(report)
    }

    async fn deliver(&self, connection_id: &str, payload: &[u8]) -> (String, DeliveryOutcome) {
        let push = self.transport.push(connection_id, payload);
        let outcome = match timeout(self.delivery_timeout, push).await {
            Ok(Ok(())) => DeliveryOutcome::Delivered,
            Ok(Err(PushError::Gone)) => {
                debug!(connection_id = %connection_id, "Peer is gone");
                DeliveryOutcome::PeerGone
            }
            Ok(Err(PushError::Transient(reason))) => {
                warn!(connection_id = %connection_id, reason = %reason, "Delivery failed");
                DeliveryOutcome::TransientError
            }
            Err(_) => {
                warn!(
                    connection_id = %connection_id,
                    timeout_ms = self.delivery_timeout.as_millis() as u64,
                    "Delivery timed out"
                );
                DeliveryOutcome::TransientError
            }
        };

        DELIVERIES_TOTAL.with_label_values(&[outcome.as_ref()]).inc();
        (connection_id.to_string(), outcome)
    }

    /// Remove gone peers; failures are logged and the id left out of the result
    async fn prune(&self, gone: &[String]) -> Vec<String> {
        let removals = gone.iter().map(|connection_id| async move {
            match self.registry.remove(connection_id).await {
                Ok(()) => {
                    info!(connection_id = %connection_id, "Removed stale connection");
                    PEERS_PRUNED_TOTAL.inc();
                    Some(connection_id.clone())
                }
                Err(e) => {
                    warn!(connection_id = %connection_id, error = %e, "Failed to remove stale connection");
                    None
                }
            }
        });

        join_all(removals).await.into_iter().flatten().collect()
    }
}
