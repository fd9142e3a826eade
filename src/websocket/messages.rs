//! WebSocket message protocol
//!
//! Frames exchanged between chat clients and the server. All frames are JSON
//! text; inbound frames are tagged by `action`, outbound frames by `type`.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::Message;

/// Message sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ClientMessage {
    /// Post a chat message to a room
    #[serde(rename = "sendMessage")]
    SendMessage {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        username: Option<String>,
        #[serde(default, rename = "roomId")]
        room_id: Option<String>,
    },
}

impl ClientMessage {
    pub fn send(message: impl Into<String>, username: impl Into<String>, room_id: impl Into<String>) -> Self {
        ClientMessage::SendMessage {
            message: Some(message.into()),
            username: Some(username.into()),
            room_id: Some(room_id.into()),
        }
    }
}

/// Message sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Broadcast chat message
    Message {
        #[serde(rename = "messageId")]
        message_id: String,
        username: String,
        message: String,
        /// Epoch milliseconds
        timestamp: i64,
        #[serde(rename = "roomId")]
        room_id: String,
    },
    /// Client-local notification; never persisted or broadcast
    System { message: String, timestamp: i64 },
    /// Rejection sent to the originating connection only
    Error { code: String, message: String },
}

impl ServerMessage {
    pub fn system(message: impl Into<String>) -> Self {
        ServerMessage::System {
            message: message.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&Message> for ServerMessage {
    fn from(message: &Message) -> Self {
        ServerMessage::Message {
            message_id: message.message_id.clone(),
            username: message.sender_name.clone(),
            message: message.body.clone(),
            timestamp: message.timestamp_millis(),
            room_id: message.room_id.clone(),
        }
    }
}
