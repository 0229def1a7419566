use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Item in the versioned base table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEvent {
    pub id: String,
    pub topic: String,
    #[serde(default)]
    pub key: Option<String>,
    pub data: serde_json::Value,
    /// Event time in milliseconds (index for range queries).
    pub timestamp: i64,
    pub processed_at: DateTime<Utc>,
    /// Expiry in milliseconds; the store may reclaim the item afterwards.
    pub ttl: i64,
    pub version: u64,
    pub last_changed_at: i64,
    #[serde(default)]
    pub deleted: bool,
}

/// Write request for the base table. Versioning and expiry are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub id: String,
    pub topic: String,
    pub key: Option<String>,
    pub data: serde_json::Value,
    /// `None` means the change time the store assigns to this write.
    pub timestamp: Option<i64>,
    /// `None` means "now" at write time.
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaKind {
    Create,
    Update,
    Delete,
}

/// Change-log entry written for every base-table mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaRecord {
    pub changed_at: i64,
    /// Tie-breaker for changes within the same millisecond.
    pub sequence: u64,
    pub kind: DeltaKind,
    pub event: StoredEvent,
    /// Expiry of this delta entry, independent of the item's own ttl.
    pub ttl: i64,
}

/// Optional predicates for an unindexed listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    pub topic: Option<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub key: Option<String>,
}

impl EventFilter {
    pub fn matches(&self, event: &StoredEvent) -> bool {
        if let Some(ref topic) = self.topic {
            if event.topic != *topic {
                return false;
            }
        }
        if let Some(ref key) = self.key {
            if event.key.as_deref() != Some(key.as_str()) {
                return false;
            }
        }
        if let Some(start) = self.start_time {
            if event.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if event.timestamp > end {
                return false;
            }
        }
        true
    }
}

/// One page of results plus the opaque cursor for the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
    /// Time the read started; clients use it as the next `lastSync`.
    pub started_at: i64,
}

impl<T> Page<T> {
    pub fn empty(started_at: i64) -> Self {
        Self {
            items: Vec::new(),
            next_token: None,
            started_at,
        }
    }
}
