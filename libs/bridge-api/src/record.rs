use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Prefix of every pub/sub channel the relay publishes to.
pub const CHANNEL_PREFIX: &str = "/kafka/";

/// A single record as delivered by the log source. The relay never mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Producer/broker timestamp in milliseconds.
    pub timestamp: i64,
    pub key: Option<Vec<u8>>,
    pub value: Vec<u8>,
}

impl LogRecord {
    /// Decode the base64 key/value of a wire record.
    ///
    /// An empty key is treated the same as an absent one.
    pub fn from_wire(topic: &str, wire: &WireRecord) -> Result<Self, base64::DecodeError> {
        let key = match wire.key.as_deref() {
            Some(k) if !k.is_empty() => Some(STANDARD.decode(k)?),
            _ => None,
        };
        Ok(Self {
            topic: topic.to_string(),
            partition: wire.partition,
            offset: wire.offset,
            timestamp: wire.timestamp,
            key,
            value: STANDARD.decode(&wire.value)?,
        })
    }
}

/// Record shape inside a relay batch: key and value are base64 strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub partition: i32,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub timestamp: i64,
}

/// One invocation's worth of records, grouped by `"<topic>-<partition>"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayBatch {
    #[serde(default)]
    pub records: BTreeMap<String, Vec<WireRecord>>,
}

impl RelayBatch {
    /// Total number of records across all partition groups.
    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Strip the trailing `-<partition>` segment from a partition-group key.
///
/// Keys without a hyphen are returned unchanged.
pub fn topic_from_group_key(group_key: &str) -> &str {
    match group_key.rsplit_once('-') {
        Some((topic, _partition)) => topic,
        None => group_key,
    }
}

pub fn channel_for(topic: &str) -> String {
    format!("{CHANNEL_PREFIX}{topic}")
}
