use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Length of the random part of a message id
const MESSAGE_ID_SUFFIX_LEN: usize = 9;

/// A chat message accepted by ingest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Message {
    /// `{room_id}-{sent_at_millis}-{suffix}`
    pub message_id: String,

    /// Logical room the message belongs to
    #[validate(length(min = 1, max = 100))]
    pub room_id: String,

    /// User id of the sending connection
    pub sender_user_id: String,

    /// Display name declared by the sender
    #[validate(length(min = 1, max = 100))]
    pub sender_name: String,

    /// Message text
    #[validate(length(min = 1))]
    pub body: String,

    /// Server-assigned send time
    pub sent_at: DateTime<Utc>,

    /// Connection the message arrived on
    pub origin_connection_id: String,

    /// When the store may garbage collect this record
    pub expires_at: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with the current time and a fresh id
    pub fn new(
        room_id: String,
        sender_user_id: String,
        sender_name: String,
        body: String,
        origin_connection_id: String,
        ttl: Duration,
    ) -> Self {
        let sent_at = Utc::now();
        Self {
            message_id: compose_message_id(&room_id, sent_at, &random_suffix()),
            room_id,
            sender_user_id,
            sender_name,
            body,
            sent_at,
            origin_connection_id,
            expires_at: sent_at + ttl,
        }
    }

    /// Send time in epoch milliseconds, as carried on the wire
    pub fn timestamp_millis(&self) -> i64 {
        self.sent_at.timestamp_millis()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Seconds remaining until expiry, floored at one
    pub fn ttl_seconds(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(1) as u64
    }
}

/// Build a message id from its room, send time and random suffix
pub fn compose_message_id(room_id: &str, sent_at: DateTime<Utc>, suffix: &str) -> String {
    format!("{}-{}-{}", room_id, sent_at.timestamp_millis(), suffix)
}

fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..MESSAGE_ID_SUFFIX_LEN].to_string()
}
