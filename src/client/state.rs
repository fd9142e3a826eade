//! Client session state machine
//!
//! A pure transition function: every event yields the effects the session
//! driver must carry out. Nothing here touches the network or the clock.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{AsRefStr, Display};

/// WebSocket close code for a normal, intentional closure
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close reason sent on explicit disconnect
pub const USER_DISCONNECT_REASON: &str = "User disconnected";

/// Lifecycle status of one client session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Reconnecting,
    Failed,
}

impl SessionStatus {
    /// Whether an explicit start is accepted from this status
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            SessionStatus::Idle | SessionStatus::Disconnected | SessionStatus::Failed
        )
    }

    /// Whether a channel is open or being opened
    pub fn has_channel(&self) -> bool {
        matches!(self, SessionStatus::Connecting | SessionStatus::Connected)
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Caller asked to connect
    Start,
    /// Channel established
    Opened,
    /// Channel closed; `None` when no close frame was received
    Closed { code: Option<u16> },
    /// Channel failed to open or broke
    TransportError(String),
    /// Reconnection delay has passed
    RetryElapsed,
    /// Caller asked to disconnect
    Disconnect,
}

/// Work the driver performs after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Status(SessionStatus),
    OpenChannel,
    CloseChannel { code: u16, reason: String },
    ScheduleRetry(Duration),
    CancelRetry,
    /// Local system notification for message observers
    Notice(String),
    /// Notification for error observers
    Error(String),
}

/// Automatic reconnection tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Retries after the initial attempt before giving up
    pub max_attempts: u32,
    /// Fixed delay before each retry
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(3000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionMachine {
    status: SessionStatus,
    retry_count: u32,
    policy: ReconnectPolicy,
    display_name: String,
}

impl SessionMachine {
    pub fn new(display_name: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            status: SessionStatus::Idle,
            retry_count: 0,
            policy,
            display_name: display_name.into(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Apply one event. Events that make no sense in the current status are
    /// ignored and yield no effects.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
        match (self.status, event) {
            (status, SessionEvent::Start) if status.can_start() => {
                self.retry_count = 0;
                self.begin_connect()
            }

            (SessionStatus::Connecting, SessionEvent::Opened) => {
                self.retry_count = 0;
                self.status = SessionStatus::Connected;
                vec![
                    Effect::Status(SessionStatus::Connected),
                    Effect::Notice(format!("Welcome to the chat, {}!", self.display_name)),
                ]
            }

            (status, SessionEvent::Closed { code }) if status.has_channel() => {
                self.channel_lost(code == Some(NORMAL_CLOSURE), Vec::new())
            }

            (status, SessionEvent::TransportError(_)) if status.has_channel() => {
                self.channel_lost(false, vec![Effect::Error("Connection error occurred".to_string())])
            }

            (SessionStatus::Reconnecting, SessionEvent::RetryElapsed) => self.begin_connect(),

            (status, SessionEvent::Disconnect) if status.has_channel() => {
                self.status = SessionStatus::Disconnected;
                vec![
                    Effect::CloseChannel {
                        code: NORMAL_CLOSURE,
                        reason: USER_DISCONNECT_REASON.to_string(),
                    },
                    Effect::CancelRetry,
                    Effect::Status(SessionStatus::Disconnected),
                ]
            }

            (SessionStatus::Reconnecting, SessionEvent::Disconnect) => {
                self.status = SessionStatus::Disconnected;
                vec![Effect::CancelRetry, Effect::Status(SessionStatus::Disconnected)]
            }

            _ => Vec::new(),
        }
    }

    fn begin_connect(&mut self) -> Vec<Effect> {
        self.status = SessionStatus::Connecting;
        vec![Effect::Status(SessionStatus::Connecting), Effect::OpenChannel]
    }

    fn channel_lost(&mut self, clean: bool, mut effects: Vec<Effect>) -> Vec<Effect> {
        self.status = SessionStatus::Disconnected;
        effects.push(Effect::Status(SessionStatus::Disconnected));

        if clean {
            return effects;
        }

        if self.retry_count < self.policy.max_attempts {
            self.retry_count += 1;
            self.status = SessionStatus::Reconnecting;
            effects.push(Effect::Status(SessionStatus::Reconnecting));
            effects.push(Effect::Notice(format!(
                "Reconnecting... (Attempt {}/{})",
                self.retry_count, self.policy.max_attempts
            )));
            effects.push(Effect::ScheduleRetry(self.policy.delay));
        } else {
            self.status = SessionStatus::Failed;
            effects.push(Effect::Status(SessionStatus::Failed));
            effects.push(Effect::Error(
                "Failed to reconnect after multiple attempts".to_string(),
            ));
        }

        effects
    }
}
