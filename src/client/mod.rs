//! Reconnecting chat client
//!
//! [`SessionMachine`] decides, [`ChatSession`] acts: it opens channels through
//! a [`Connector`], schedules retries and fans notifications out to three
//! observer lists (status, messages, errors).

pub mod observers;
pub mod session;
pub mod state;
pub mod transport;

pub use observers::{ListenerId, Observers};
pub use session::{ChatSession, Identity, SendError};
pub use state::{
    Effect, ReconnectPolicy, SessionEvent, SessionMachine, SessionStatus, NORMAL_CLOSURE,
};
pub use transport::{Channel, ConnectionError, Connector, Frame, TungsteniteConnector};
