use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::message::DecodedMessage;

/// Outbound message for one log record. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub data: DecodedMessage,
    pub schema_registry_used: bool,
    pub processed_at: DateTime<Utc>,
}

impl EventEnvelope {
    /// Deterministic id derived from log coordinates; redelivery maps to the same id.
    pub fn archive_id(&self) -> String {
        format!("{}-{}-{}", self.topic, self.partition, self.offset)
    }
}
