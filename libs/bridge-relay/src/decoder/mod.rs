pub mod avro;
pub mod header;
pub mod registry;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bridge_api::{DecodedMessage, StructuredRecord};

use crate::config::RegistryConfig;
use crate::error::{DecodeError, RelayError};
use registry::{SchemaRef, SchemaRegistry};

pub type DecodeFuture<'a> = Pin<Box<dyn Future<Output = Decoded> + Send + 'a>>;

/// Decoder output: the message plus whether a registry schema produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub message: DecodedMessage,
    pub registry_used: bool,
}

impl Decoded {
    fn plain(message: DecodedMessage) -> Self {
        Self {
            message,
            registry_used: false,
        }
    }

    fn structured(record: StructuredRecord) -> Self {
        Self {
            message: DecodedMessage::Structured(record),
            registry_used: true,
        }
    }
}

/// Raw record value → decoded message. Total: every input yields a message.
pub trait MessageDecoder: Send + Sync {
    fn decode<'a>(&'a self, topic: &'a str, raw: &'a [u8]) -> DecodeFuture<'a>;
}

/// JSON when the bytes parse as UTF-8 JSON, raw bytes otherwise.
fn json_or_raw(raw: &[u8]) -> DecodedMessage {
    match parse_json(raw) {
        Some(value) => DecodedMessage::Json(value),
        None => DecodedMessage::Raw(raw.to_vec()),
    }
}

fn parse_json(raw: &[u8]) -> Option<serde_json::Value> {
    let text = std::str::from_utf8(raw).ok()?;
    serde_json::from_str(text).ok()
}

/// Decoder used when no registry is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughDecoder;

impl MessageDecoder for PassthroughDecoder {
    fn decode<'a>(&'a self, _topic: &'a str, raw: &'a [u8]) -> DecodeFuture<'a> {
        Box::pin(async move { Decoded::plain(json_or_raw(raw)) })
    }
}

/// Registry-aware decoder.
///
/// Order: registry-framed Avro, then JSON, then headerless Avro for topics
/// mapped to a schema name, then raw bytes. Registry failures are logged and
/// fall through to the next strategy.
pub struct RegistryDecoder {
    registry: Arc<SchemaRegistry>,
    topic_schemas: HashMap<String, String>,
}

impl RegistryDecoder {
    pub fn new(registry: Arc<SchemaRegistry>, topic_schemas: HashMap<String, String>) -> Self {
        Self {
            registry,
            topic_schemas,
        }
    }

    async fn decode_framed(&self, raw: &[u8]) -> Result<StructuredRecord, DecodeError> {
        let (header, body) = header::unframe(raw)?;
        let schema = self
            .registry
            .schema(SchemaRef::Version(&header.schema_version_id))
            .await?;
        let fields = avro::decode_datum(&schema, &body)
            .map_err(|e| e.with_context(&header.schema_version_id))?;
        Ok(StructuredRecord {
            schema_id: header.schema_version_id,
            fields,
        })
    }

    async fn decode_mapped(
        &self,
        schema_name: &str,
        raw: &[u8],
    ) -> Result<StructuredRecord, DecodeError> {
        let schema = self.registry.schema(SchemaRef::Name(schema_name)).await?;
        let fields = avro::decode_datum(&schema, raw).map_err(|e| e.with_context(schema_name))?;
        Ok(StructuredRecord {
            schema_id: schema_name.to_string(),
            fields,
        })
    }
}

impl MessageDecoder for RegistryDecoder {
    fn decode<'a>(&'a self, topic: &'a str, raw: &'a [u8]) -> DecodeFuture<'a> {
        Box::pin(async move {
            if header::is_framed(raw) {
                match self.decode_framed(raw).await {
                    Ok(record) => return Decoded::structured(record),
                    Err(e) => {
                        tracing::warn!(topic = %topic, registry = %self.registry.name(), error = %e, "registry decode failed, falling back");
                    }
                }
            }

            if let Some(value) = parse_json(raw) {
                return Decoded::plain(DecodedMessage::Json(value));
            }

            if let Some(schema_name) = self.topic_schemas.get(topic) {
                match self.decode_mapped(schema_name, raw).await {
                    Ok(record) => return Decoded::structured(record),
                    Err(e) => {
                        tracing::debug!(topic = %topic, schema = %schema_name, error = %e, "headerless avro decode failed");
                    }
                }
            }

            Decoded::plain(DecodedMessage::Raw(raw.to_vec()))
        })
    }
}

/// Pick the decoder once, at startup.
pub fn build_decoder(
    registry: Option<&RegistryConfig>,
) -> Result<Arc<dyn MessageDecoder>, RelayError> {
    match registry {
        Some(config) => {
            let registry = Arc::new(SchemaRegistry::from_config(config)?);
            Ok(Arc::new(RegistryDecoder::new(
                registry,
                config.topic_schemas.clone(),
            )))
        }
        None => Ok(Arc::new(PassthroughDecoder)),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::decoder::avro::{RIDE_SCHEMA, encode_ride};
    use crate::decoder::registry::DirectorySchemaSource;

    const VERSION: uuid::Uuid = uuid::Uuid::from_u128(0x1111_2222_3333_4444_5555_6666_7777_8888);

    fn registry_decoder(dir: &std::path::Path) -> RegistryDecoder {
        let registry = SchemaRegistry::new("rides", Box::new(DirectorySchemaSource::new(dir)));
        RegistryDecoder::new(
            Arc::new(registry),
            HashMap::from([("taxi-rides".to_string(), "taxi-trip-schema".to_string())]),
        )
    }

    fn schema_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(format!("{VERSION}.avsc")), RIDE_SCHEMA).unwrap();
        std::fs::write(dir.path().join("taxi-trip-schema.avsc"), RIDE_SCHEMA).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_passthrough_json() {
        let decoded = PassthroughDecoder.decode("t", br#"{"foo":1}"#).await;
        assert_eq!(decoded.message, DecodedMessage::Json(serde_json::json!({ "foo": 1 })));
        assert!(!decoded.registry_used);
    }

    #[tokio::test]
    async fn test_passthrough_raw_fallback() {
        let decoded = PassthroughDecoder.decode("t", &[0xFF, 0xFE]).await;
        assert_eq!(
            serde_json::to_value(&decoded.message).unwrap(),
            serde_json::json!({ "raw_bytes": "//4=" })
        );
    }

    #[tokio::test]
    async fn test_passthrough_ignores_registry_header() {
        let raw = header::frame(0x00, VERSION, &encode_ride("r-1", 3.0));
        let decoded = PassthroughDecoder.decode("taxi-rides", &raw).await;
        assert!(matches!(decoded.message, DecodedMessage::Raw(_)));
        assert!(!decoded.registry_used);
    }

    #[tokio::test]
    async fn test_registry_framed_avro() {
        let dir = schema_dir();
        let decoder = registry_decoder(dir.path());

        let raw = header::frame(0x00, VERSION, &encode_ride("r-1", 3.0));
        let decoded = decoder.decode("anything", &raw).await;

        assert!(decoded.registry_used);
        assert_eq!(decoded.message.schema_id(), Some(VERSION.to_string().as_str()));
        assert_eq!(decoded.message.to_value()["ride_id"], "r-1");
    }

    #[tokio::test]
    async fn test_registry_framed_zlib_avro() {
        let dir = schema_dir();
        let decoder = registry_decoder(dir.path());

        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
        encoder.write_all(&encode_ride("r-2", 8.25)).unwrap();
        let raw = header::frame(0x05, VERSION, &encoder.finish().unwrap());

        let decoded = decoder.decode("anything", &raw).await;
        assert!(decoded.registry_used);
        assert_eq!(decoded.message.to_value()["fare"], 8.25);
    }

    #[tokio::test]
    async fn test_registry_failure_falls_through_to_raw() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = registry_decoder(dir.path());

        let raw = header::frame(0x00, VERSION, b"\x01\x02\x03");
        let decoded = decoder.decode("unmapped", &raw).await;
        assert_eq!(decoded.message, DecodedMessage::Raw(raw.clone()));
        assert!(!decoded.registry_used);
    }

    #[tokio::test]
    async fn test_oversized_zlib_frame_falls_through_to_raw() {
        let dir = schema_dir();
        let decoder = registry_decoder(dir.path());

        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::best());
        encoder.write_all(&vec![0u8; header::MAX_INFLATED * 2]).unwrap();
        let raw = header::frame(0x05, VERSION, &encoder.finish().unwrap());

        let decoded = decoder.decode("unmapped", &raw).await;
        assert_eq!(decoded.message, DecodedMessage::Raw(raw.clone()));
        assert!(!decoded.registry_used);
    }

    #[tokio::test]
    async fn test_short_header_is_not_registry_path() {
        let dir = schema_dir();
        let decoder = registry_decoder(dir.path());

        // Exactly 18 bytes: never framed, even with the version byte.
        let raw = [header::HEADER_VERSION; header::HEADER_LEN];
        let decoded = decoder.decode("unmapped", &raw).await;
        assert_eq!(decoded.message, DecodedMessage::Raw(raw.to_vec()));
    }

    #[tokio::test]
    async fn test_registry_decoder_prefers_json() {
        let dir = schema_dir();
        let decoder = registry_decoder(dir.path());

        let decoded = decoder.decode("taxi-rides", br#"{"ride_id":"j"}"#).await;
        assert_eq!(decoded.message, DecodedMessage::Json(serde_json::json!({ "ride_id": "j" })));
        assert!(!decoded.registry_used);
    }

    #[tokio::test]
    async fn test_headerless_avro_for_mapped_topic() {
        let dir = schema_dir();
        let decoder = registry_decoder(dir.path());

        let decoded = decoder.decode("taxi-rides", &encode_ride("r-3", 1.5)).await;
        assert!(decoded.registry_used);
        assert_eq!(decoded.message.schema_id(), Some("taxi-trip-schema"));
        assert_eq!(decoded.message.to_value()["passengers"], 2);
    }

    #[test]
    fn test_build_decoder_validates_registry() {
        let config = RegistryConfig {
            name: "rides".into(),
            auto_registration: true,
            region: None,
            schema_dir: None,
            url: None,
            topic_schemas: HashMap::new(),
        };
        assert!(build_decoder(Some(&config)).is_err());
        assert!(build_decoder(None).is_ok());
    }
}
