pub mod handlers;
pub mod routes;

pub use routes::*;

use axum::extract::FromRef;
use std::sync::Arc;
use std::time::Instant;

use crate::websocket::ChatState;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatState>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(chat: Arc<ChatState>) -> Self {
        Self {
            chat,
            started_at: Instant::now(),
        }
    }
}

impl FromRef<AppState> for Arc<ChatState> {
    fn from_ref(state: &AppState) -> Self {
        state.chat.clone()
    }
}
