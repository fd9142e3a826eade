use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;
use crate::metrics::CONNECTIONS_TOTAL;
use crate::models::ConnectionRecord;
use crate::state::ConnectionStore;

/// View of all live connections, backed by a connection record store
pub struct ConnectionRegistry {
    store: Arc<dyn ConnectionStore>,
}

impl ConnectionRegistry {
    pub fn new(store: Arc<dyn ConnectionStore>) -> Self {
        Self { store }
    }

    /// Register a connection; a duplicate id overwrites the previous record
    pub async fn add(&self, record: ConnectionRecord) -> Result<()> {
        self.store.put_connection(&record).await?;
        CONNECTIONS_TOTAL.inc();

        info!(
            connection_id = %record.connection_id,
            user_id = %record.user_id,
            "Connection registered"
        );
        Ok(())
    }

    /// Remove a connection; unknown ids are ignored
    pub async fn remove(&self, connection_id: &str) -> Result<()> {
        self.store.delete_connection(connection_id).await?;
        debug!(connection_id = %connection_id, "Connection removed");
        Ok(())
    }

    /// Point-in-time listing of every registered connection
    pub async fn snapshot(&self) -> Result<RegistrySnapshot> {
        let records = self.store.scan_connections().await?;
        Ok(RegistrySnapshot::new(records))
    }

    /// Fetch one record; for diagnostics, not used during fanout
    pub async fn lookup(&self, connection_id: &str) -> Result<Option<ConnectionRecord>> {
        self.store.get_connection(connection_id).await
    }
}

/// Immutable listing of connection records taken at one instant
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    records: Arc<[ConnectionRecord]>,
}

impl RegistrySnapshot {
    pub fn new(records: Vec<ConnectionRecord>) -> Self {
        Self {
            records: records.into(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.records.iter().any(|r| r.connection_id == connection_id)
    }
}
