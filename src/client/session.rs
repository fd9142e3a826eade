use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::observers::{ListenerId, Observers};
use super::state::{
    Effect, ReconnectPolicy, SessionEvent, SessionMachine, SessionStatus, NORMAL_CLOSURE,
    USER_DISCONNECT_REASON,
};
use super::transport::{Channel, ConnectionError, Connector, Frame, TungsteniteConnector};
use crate::config::ClientConfig;
use crate::websocket::messages::{ClientMessage, ServerMessage};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("Session is not connected")]
    NotConnected,

    #[error("Channel closed")]
    ChannelClosed,
}

/// Who this client claims to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// A reconnecting chat client session.
///
/// Must be used from within a tokio runtime. At most one channel is open at a
/// time; a new connect attempt waits for the previous channel task to finish.
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

/// Events waiting for the machine. Whoever finds it idle drains it, so one
/// event's effects are fully applied before the next event is handled.
#[derive(Default)]
struct EventQueue {
    pending: VecDeque<(Option<u64>, SessionEvent)>,
    draining: bool,
}

struct SessionInner {
    connector: Arc<dyn Connector>,
    url: Url,
    identity: Identity,
    room_id: String,
    machine: Mutex<SessionMachine>,
    events: Mutex<EventQueue>,
    /// Bumped whenever a channel is opened or closed by the session
    generation: AtomicU64,
    channel: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
    retry: Mutex<Option<JoinHandle<()>>>,
    status_observers: Observers<SessionStatus>,
    message_observers: Observers<ServerMessage>,
    error_observers: Observers<String>,
}

impl ChatSession {
    pub fn new(
        connector: Arc<dyn Connector>,
        url: Url,
        identity: Identity,
        room_id: impl Into<String>,
        policy: ReconnectPolicy,
    ) -> Self {
        let machine = SessionMachine::new(identity.display_name.clone(), policy);
        Self {
            inner: Arc::new(SessionInner {
                connector,
                url,
                identity,
                room_id: room_id.into(),
                machine: Mutex::new(machine),
                events: Mutex::new(EventQueue::default()),
                generation: AtomicU64::new(0),
                channel: Mutex::new(None),
                driver: Mutex::new(None),
                retry: Mutex::new(None),
                status_observers: Observers::new(),
                message_observers: Observers::new(),
                error_observers: Observers::new(),
            }),
        }
    }

    /// Session over a real WebSocket, configured from `config`
    pub fn from_config(config: &ClientConfig, identity: Identity) -> Result<Self, ConnectionError> {
        let url = Url::parse(&config.url)?;
        Ok(Self::new(
            Arc::new(TungsteniteConnector),
            url,
            identity,
            config.room_id.clone(),
            config.reconnect_policy(),
        ))
    }

    pub fn start(&self) {
        self.inner.dispatch(SessionEvent::Start);
    }

    pub fn disconnect(&self) {
        self.inner.dispatch(SessionEvent::Disconnect);
    }

    /// Send a chat message; only accepted while connected
    pub fn send(&self, text: &str) -> Result<(), SendError> {
        if self.status() != SessionStatus::Connected {
            return Err(SendError::NotConnected);
        }

        let envelope = ClientMessage::send(text, self.inner.identity.display_name.clone(), self.inner.room_id.clone());
        let json = serde_json::to_string(&envelope).map_err(|_| SendError::ChannelClosed)?;

        let channel = self.inner.channel.lock();
        let outbound = channel.as_ref().ok_or(SendError::NotConnected)?;
        outbound.send(Frame::Text(json)).map_err(|_| SendError::ChannelClosed)
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.machine.lock().status()
    }

    pub fn retry_count(&self) -> u32 {
        self.inner.machine.lock().retry_count()
    }

    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    pub fn on_status<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SessionStatus) + Send + Sync + 'static,
    {
        self.inner.status_observers.subscribe(listener)
    }

    pub fn on_message<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ServerMessage) + Send + Sync + 'static,
    {
        self.inner.message_observers.subscribe(listener)
    }

    pub fn on_error<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&String) + Send + Sync + 'static,
    {
        self.inner.error_observers.subscribe(listener)
    }

    pub fn unsubscribe_status(&self, id: ListenerId) -> bool {
        self.inner.status_observers.unsubscribe(id)
    }

    pub fn unsubscribe_message(&self, id: ListenerId) -> bool {
        self.inner.message_observers.unsubscribe(id)
    }

    pub fn unsubscribe_error(&self, id: ListenerId) -> bool {
        self.inner.error_observers.unsubscribe(id)
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(retry) = self.inner.retry.lock().take() {
            retry.abort();
        }
        if let Some(driver) = self.inner.driver.lock().take() {
            driver.abort();
        }
    }
}

impl SessionInner {
    fn dispatch(self: &Arc<Self>, event: SessionEvent) {
        self.dispatch_for(None, event);
    }

    /// Queue an event for the machine. Channel events carry their generation
    /// and are dropped once it is stale. Events raised while effects are being
    /// applied, including from observers, wait their turn.
    fn dispatch_for(self: &Arc<Self>, generation: Option<u64>, event: SessionEvent) {
        {
            let mut events = self.events.lock();
            events.pending.push_back((generation, event));
            if events.draining {
                return;
            }
            events.draining = true;
        }

        loop {
            let next = {
                let mut events = self.events.lock();
                match events.pending.pop_front() {
                    Some(next) => next,
                    None => {
                        events.draining = false;
                        return;
                    }
                }
            };
            let (generation, event) = next;
            self.step(generation, event);
        }
    }

    fn step(self: &Arc<Self>, generation: Option<u64>, event: SessionEvent) {
        let (effects, current) = {
            let mut machine = self.machine.lock();
            if let Some(generation) = generation {
                if generation != self.generation.load(Ordering::SeqCst) {
                    debug!(?event, "Ignoring event from stale channel");
                    return;
                }
            }

            let effects = machine.handle(event);
            if effects
                .iter()
                .any(|e| matches!(e, Effect::OpenChannel | Effect::CloseChannel { .. }))
            {
                self.generation.fetch_add(1, Ordering::SeqCst);
            }
            (effects, self.generation.load(Ordering::SeqCst))
        };

        for effect in effects {
            self.apply(effect, current);
        }
    }

    fn apply(self: &Arc<Self>, effect: Effect, generation: u64) {
        match effect {
            Effect::Status(status) => {
                info!(user_id = %self.identity.user_id, status = %status, "Session status changed");
                self.status_observers.notify(&status);
            }
            Effect::OpenChannel => {
                let mut driver = self.driver.lock();
                let previous = driver.take();
                *driver = Some(tokio::spawn(run_channel(self.clone(), generation, previous)));
            }
            Effect::CloseChannel { code, reason } => {
                if let Some(outbound) = self.channel.lock().take() {
                    let _ = outbound.send(Frame::Close { code, reason });
                }
            }
            Effect::ScheduleRetry(delay) => {
                let inner = self.clone();
                let timer = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    inner.dispatch(SessionEvent::RetryElapsed);
                });
                if let Some(stale) = self.retry.lock().replace(timer) {
                    stale.abort();
                }
            }
            Effect::CancelRetry => {
                if let Some(timer) = self.retry.lock().take() {
                    timer.abort();
                }
            }
            Effect::Notice(text) => {
                self.message_observers.notify(&ServerMessage::system(text));
            }
            Effect::Error(text) => {
                warn!(user_id = %self.identity.user_id, error = %text, "Session error");
                self.error_observers.notify(&text);
            }
        }
    }

    fn connect_url(&self) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("userId", &self.identity.user_id)
            .append_pair("username", &self.identity.display_name);
        url
    }

    /// Publish the writer of a freshly opened channel unless it is already stale
    fn install(&self, generation: u64, outbound: mpsc::UnboundedSender<Frame>) -> bool {
        let mut channel = self.channel.lock();
        if generation != self.generation.load(Ordering::SeqCst) {
            let _ = outbound.send(Frame::Close {
                code: NORMAL_CLOSURE,
                reason: USER_DISCONNECT_REASON.to_string(),
            });
            return false;
        }
        *channel = Some(outbound);
        true
    }

    fn release(&self, generation: u64) {
        let mut channel = self.channel.lock();
        if generation == self.generation.load(Ordering::SeqCst) {
            channel.take();
        }
    }

    fn deliver(&self, text: &str) {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(message) => self.message_observers.notify(&message),
            Err(e) => debug!(error = %e, "Ignoring unrecognized frame"),
        }
    }
}

async fn run_channel(inner: Arc<SessionInner>, generation: u64, previous: Option<JoinHandle<()>>) {
    if let Some(previous) = previous {
        previous.abort();
        let _ = previous.await;
    }

    let url = inner.connect_url();
    let Channel { outbound, mut inbound } = match inner.connector.connect(&url).await {
        Ok(channel) => channel,
        Err(e) => {
            inner.dispatch_for(Some(generation), SessionEvent::TransportError(e.to_string()));
            return;
        }
    };

    if !inner.install(generation, outbound) {
        return;
    }
    inner.dispatch_for(Some(generation), SessionEvent::Opened);

    let event = loop {
        match inbound.recv().await {
            Some(Ok(Frame::Text(text))) => inner.deliver(&text),
            Some(Ok(Frame::Close { code, .. })) => break SessionEvent::Closed { code: Some(code) },
            Some(Err(e)) => break SessionEvent::TransportError(e.to_string()),
            None => break SessionEvent::Closed { code: None },
        }
    };

    inner.release(generation);
    inner.dispatch_for(Some(generation), event);
}
