use chrono::{DateTime, Utc};

use bridge_api::{DecodedMessage, EventEnvelope, LogRecord};

/// Envelope for one record. Pure: the same inputs always give the same envelope.
///
/// The key is decoded as lossy UTF-8; an absent key stays absent.
pub fn build_envelope(
    record: &LogRecord,
    data: DecodedMessage,
    schema_registry_used: bool,
    processed_at: DateTime<Utc>,
) -> EventEnvelope {
    EventEnvelope {
        topic: record.topic.clone(),
        partition: record.partition,
        offset: record.offset,
        timestamp: record.timestamp,
        key: record
            .key
            .as_deref()
            .map(|k| String::from_utf8_lossy(k).into_owned()),
        data,
        schema_registry_used,
        processed_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: Option<&[u8]>) -> LogRecord {
        LogRecord {
            topic: "taxi-rides".into(),
            partition: 3,
            offset: 42,
            timestamp: 1_000,
            key: key.map(<[u8]>::to_vec),
            value: br#"{"foo":1}"#.to_vec(),
        }
    }

    fn at() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_copies_record_coordinates() {
        let data = DecodedMessage::Json(serde_json::json!({ "foo": 1 }));
        let envelope = build_envelope(&record(Some(b"a")), data.clone(), false, at());

        assert_eq!(envelope.topic, "taxi-rides");
        assert_eq!(envelope.partition, 3);
        assert_eq!(envelope.offset, 42);
        assert_eq!(envelope.timestamp, 1_000);
        assert_eq!(envelope.key.as_deref(), Some("a"));
        assert_eq!(envelope.data, data);
        assert_eq!(envelope.processed_at, at());
    }

    #[test]
    fn test_deterministic() {
        let data = DecodedMessage::Raw(vec![1, 2]);
        let a = build_envelope(&record(None), data.clone(), true, at());
        let b = build_envelope(&record(None), data, true, at());
        assert_eq!(a, b);
        assert!(a.key.is_none());
    }

    #[test]
    fn test_invalid_utf8_key_is_lossy() {
        let envelope = build_envelope(&record(Some(&[b'k', 0xFF])), DecodedMessage::Raw(vec![]), false, at());
        assert_eq!(envelope.key.as_deref(), Some("k\u{FFFD}"));
    }
}
