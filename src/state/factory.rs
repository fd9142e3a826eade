use crate::config::{StateBackend, StateConfig};
use crate::error::{AppError, Result};
use crate::state::{ConnectionStore, InMemoryStore, MessageStore, RedisStore, SledStore};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Connection and message stores backed by the same engine
#[derive(Clone)]
pub struct Stores {
    pub connections: Arc<dyn ConnectionStore>,
    pub messages: Arc<dyn MessageStore>,
}

impl Stores {
    fn from_backend<S>(store: S) -> Self
    where
        S: ConnectionStore + MessageStore + 'static,
    {
        let store = Arc::new(store);
        Self {
            connections: store.clone(),
            messages: store,
        }
    }
}

/// Create record stores based on configuration
pub async fn create_stores(config: &StateConfig) -> Result<Stores> {
    match config.backend {
        StateBackend::Memory => Ok(create_in_memory_stores()),

        StateBackend::Sled => {
            let path = config.path.as_ref().ok_or_else(|| {
                AppError::Configuration("Sled backend requires 'path' configuration".to_string())
            })?;

            tracing::info!(path = ?path, "Initializing Sled storage backend");
            Ok(Stores::from_backend(SledStore::new(path)?))
        }

        StateBackend::Redis => {
            let redis_url = config.redis_url.as_ref().ok_or_else(|| {
                AppError::Configuration("Redis backend requires 'redis_url' configuration".to_string())
            })?;

            tracing::info!(url = %redis_url, "Initializing Redis storage backend");
            let store = RedisStore::new_with_prefix(redis_url, &config.key_prefix).await?;
            Ok(Stores::from_backend(store))
        }
    }
}

/// Create in-memory stores (for testing and development)
pub fn create_in_memory_stores() -> Stores {
    tracing::info!("Initializing in-memory storage backend");
    Stores::from_backend(InMemoryStore::new())
}

/// Periodic sweep of expired connection and message records
pub async fn cleanup_task(stores: Stores, every: Duration) {
    let mut ticker = interval(every);

    loop {
        ticker.tick().await;
        let now = Utc::now();

        match stores.connections.purge_expired_connections(now).await {
            Ok(0) => {}
            Ok(purged) => tracing::info!(purged = purged, "Purged expired connection records"),
            Err(e) => tracing::warn!(error = %e, "Failed to purge expired connections"),
        }

        match stores.messages.purge_expired_messages(now).await {
            Ok(0) => {}
            Ok(purged) => tracing::info!(purged = purged, "Purged expired messages"),
            Err(e) => tracing::warn!(error = %e, "Failed to purge expired messages"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_sled_stores() {
        let temp_dir = TempDir::new().unwrap();
        let config = StateConfig {
            backend: StateBackend::Sled,
            path: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };

        let stores = create_stores(&config).await.unwrap();
        assert!(stores.connections.scan_connections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_in_memory_stores() {
        let stores = create_stores(&StateConfig::default()).await.unwrap();
        assert!(stores.connections.scan_connections().await.is_ok());
        assert!(stores.messages.get_message("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sled_requires_path() {
        let config = StateConfig {
            backend: StateBackend::Sled,
            ..Default::default()
        };
        assert!(create_stores(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_redis_requires_url() {
        let config = StateConfig {
            backend: StateBackend::Redis,
            ..Default::default()
        };
        assert!(create_stores(&config).await.is_err());
    }
}
