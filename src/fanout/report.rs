use serde::Serialize;
use strum::{AsRefStr, Display};

/// Classification of one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    PeerGone,
    TransientError,
}

/// Per-broadcast summary, used for observability only
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryReport {
    pub message_id: String,
    pub delivered: usize,
    pub peer_gone: usize,
    pub transient_errors: usize,
    /// Connections actually removed from the registry
    pub pruned: Vec<String>,
    pub outcomes: Vec<(String, DeliveryOutcome)>,
}

impl DeliveryReport {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, connection_id: String, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::PeerGone => self.peer_gone += 1,
            DeliveryOutcome::TransientError => self.transient_errors += 1,
        }
        self.outcomes.push((connection_id, outcome));
    }

    /// Total attempts dispatched
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    /// Connection ids that reported gone
    pub fn gone(&self) -> Vec<String> {
        self.ids_with(DeliveryOutcome::PeerGone)
    }

    pub fn outcome_for(&self, connection_id: &str) -> Option<DeliveryOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == connection_id)
            .map(|(_, outcome)| *outcome)
    }

    fn ids_with(&self, wanted: DeliveryOutcome) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == wanted)
            .map(|(id, _)| id.clone())
            .collect()
    }
}
