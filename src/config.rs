use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::client::ReconnectPolicy;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Record store configuration
    #[serde(default)]
    pub state: StateConfig,

    /// Broadcast fanout configuration
    #[serde(default)]
    pub fanout: FanoutConfig,

    /// Message ingest configuration
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Client session configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::with_name(&config_path).required(false))
            // Environment overrides, e.g. CHAT_FANOUT__SERVER__HTTP_PORT=9000
            .add_source(
                config::Environment::with_prefix("CHAT_FANOUT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Store backend type
    #[serde(default)]
    pub backend: StateBackend,

    /// Path for the embedded database (sled)
    pub path: Option<PathBuf>,

    /// Redis connection string
    pub redis_url: Option<String>,

    /// Key prefix used by the redis backend
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: StateBackend::default(),
            path: None,
            redis_url: None,
            key_prefix: default_key_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    #[default]
    Memory,
    Sled,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutConfig {
    /// Upper bound for a single delivery attempt (milliseconds)
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,

    /// Interval between server ping frames (seconds)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Interval between expired record sweeps (seconds)
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

impl FanoutConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            delivery_timeout_ms: default_delivery_timeout_ms(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Room used when the sender does not name one
    #[serde(default = "default_room")]
    pub default_room: String,

    /// Maximum message body length in characters
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    /// Connection record lifetime (seconds)
    #[serde(default = "default_connection_ttl")]
    pub connection_ttl_secs: i64,

    /// Message record lifetime (seconds)
    #[serde(default = "default_message_ttl")]
    pub message_ttl_secs: i64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            default_room: default_room(),
            max_message_length: default_max_message_length(),
            connection_ttl_secs: default_connection_ttl(),
            message_ttl_secs: default_message_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// WebSocket endpoint the client connects to
    #[serde(default = "default_client_url")]
    pub url: String,

    /// Room every outgoing message is sent to
    #[serde(default = "default_room")]
    pub room_id: String,

    /// Automatic reconnection attempts before giving up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Fixed delay before each reconnection attempt (milliseconds)
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl ClientConfig {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_reconnect_attempts,
            delay: Duration::from_millis(self.reconnect_delay_ms),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_client_url(),
            room_id: default_room(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: true,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_key_prefix() -> String {
    "chat-fanout".to_string()
}

fn default_delivery_timeout_ms() -> u64 {
    5000
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_room() -> String {
    "general".to_string()
}

fn default_max_message_length() -> usize {
    1000
}

fn default_connection_ttl() -> i64 {
    86_400 // 24 hours
}

fn default_message_ttl() -> i64 {
    2_592_000 // 30 days
}

fn default_client_url() -> String {
    "ws://localhost:8080/ws".to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
