use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Payload decoded through a registry schema.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRecord {
    /// Schema version id (registry header) or schema name (topic mapping).
    pub schema_id: String,
    pub fields: serde_json::Value,
}

/// Result of decoding a record value. Decoding always produces one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    Structured(StructuredRecord),
    Json(serde_json::Value),
    /// Undecodable bytes, carried as `{"raw_bytes": "<base64>"}` on the wire.
    Raw(Vec<u8>),
}

impl DecodedMessage {
    /// JSON shape of the message, as published and archived.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            DecodedMessage::Structured(record) => record.fields.clone(),
            DecodedMessage::Json(value) => value.clone(),
            DecodedMessage::Raw(bytes) => {
                serde_json::json!({ "raw_bytes": STANDARD.encode(bytes) })
            }
        }
    }

    pub fn schema_id(&self) -> Option<&str> {
        match self {
            DecodedMessage::Structured(record) => Some(&record.schema_id),
            _ => None,
        }
    }
}

impl Serialize for DecodedMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DecodedMessage::Structured(record) => record.fields.serialize(serializer),
            DecodedMessage::Json(value) => value.serialize(serializer),
            DecodedMessage::Raw(bytes) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("raw_bytes", &STANDARD.encode(bytes))?;
                map.end()
            }
        }
    }
}
