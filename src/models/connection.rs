use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// User id recorded when the client does not supply one
pub const ANONYMOUS_USER_ID: &str = "anonymous";

/// Display name recorded when the client does not supply one
pub const ANONYMOUS_DISPLAY_NAME: &str = "Anonymous User";

/// A live peer registered at connect time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Transport-assigned connection identifier (primary key)
    pub connection_id: String,

    /// Caller-supplied user identifier
    pub user_id: String,

    /// Caller-supplied display name
    pub display_name: String,

    /// When the connection was registered
    pub connected_at: DateTime<Utc>,

    /// When the store may garbage collect this record
    pub expires_at: DateTime<Utc>,
}

impl ConnectionRecord {
    /// Create a record, substituting anonymous defaults for absent or blank identity
    pub fn new(
        connection_id: impl Into<String>,
        user_id: Option<String>,
        display_name: Option<String>,
        ttl: Duration,
    ) -> Self {
        let connected_at = Utc::now();
        Self {
            connection_id: connection_id.into(),
            user_id: non_blank(user_id).unwrap_or_else(|| ANONYMOUS_USER_ID.to_string()),
            display_name: non_blank(display_name)
                .unwrap_or_else(|| ANONYMOUS_DISPLAY_NAME.to_string()),
            connected_at,
            expires_at: connected_at + ttl,
        }
    }

    /// Whether the record has outlived its TTL
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Seconds remaining until expiry, floored at one
    pub fn ttl_seconds(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(1) as u64
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_missing_identity() {
        let record = ConnectionRecord::new("conn-1", None, Some("  ".to_string()), Duration::hours(24));
        assert_eq!(record.user_id, ANONYMOUS_USER_ID);
        assert_eq!(record.display_name, ANONYMOUS_DISPLAY_NAME);
        assert_eq!(record.expires_at - record.connected_at, Duration::hours(24));
    }

    #[test]
    fn test_supplied_identity_is_kept() {
        let record = ConnectionRecord::new(
            "conn-2",
            Some("u1".to_string()),
            Some("Alice".to_string()),
            Duration::hours(24),
        );
        assert_eq!(record.user_id, "u1");
        assert_eq!(record.display_name, "Alice");
        assert!(!record.is_expired(Utc::now()));
        assert!(record.is_expired(record.expires_at));
    }
}
