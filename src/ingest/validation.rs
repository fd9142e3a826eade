use thiserror::Error;

use crate::websocket::messages::ClientMessage;

/// Reasons an inbound frame is rejected before any side effect
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field {field} exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("Invalid message: {0}")]
    Invalid(String),
}

impl ValidationError {
    /// Short label used for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::Malformed(_) => "malformed",
            ValidationError::MissingField(_) => "missing_field",
            ValidationError::TooLong { .. } => "too_long",
            ValidationError::Invalid(_) => "invalid",
        }
    }
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ValidationError::Invalid(errors.to_string())
    }
}

/// A send request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    /// Trimmed message body
    pub body: String,
    pub username: String,
    pub room_id: Option<String>,
}

/// Parse and validate a raw `sendMessage` frame
pub fn parse_send_request(raw: &str, max_message_length: usize) -> Result<SendRequest, ValidationError> {
    let ClientMessage::SendMessage {
        message,
        username,
        room_id,
    } = serde_json::from_str(raw).map_err(|e| ValidationError::Malformed(e.to_string()))?;

    let body = required(message, "message")?;
    let username = required(username, "username")?;

    if body.chars().count() > max_message_length {
        return Err(ValidationError::TooLong {
            field: "message",
            max: max_message_length,
        });
    }

    let room_id = room_id
        .map(|room| room.trim().to_string())
        .filter(|room| !room.is_empty());

    Ok(SendRequest {
        body,
        username,
        room_id,
    })
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ValidationError::MissingField(field))
}
