//! Real-time chat fanout
//!
//! Clients open a persistent WebSocket channel, register presence, and exchange
//! short text messages that are delivered to every other connected client.
//!
//! # Architecture
//!
//! - **State**: connection and message record stores (in-memory, sled, redis)
//! - **Fanout**: connection registry and the concurrent broadcast engine
//! - **Ingest**: validation, persistence and hand-off to the broadcast engine
//! - **WebSocket**: live socket transport and the `/ws` endpoint
//! - **Client**: reconnecting client session state machine
//! - **API**: HTTP router with health, stats and metrics endpoints

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod fanout;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod state;
pub mod websocket;

pub use error::{AppError, Result};
