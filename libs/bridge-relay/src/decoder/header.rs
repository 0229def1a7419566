use std::borrow::Cow;
use std::io::Read;

use crate::error::DecodeError;

/// First byte of a registry-framed payload.
pub const HEADER_VERSION: u8 = 0x03;
/// Version byte + compression byte + 16-byte schema version id.
pub const HEADER_LEN: usize = 18;

/// Upper bound on an inflated body. Larger frames are rejected before allocation grows past it.
pub const MAX_INFLATED: usize = 8 * 1024 * 1024;

const COMPRESSION_NONE: u8 = 0x00;
const COMPRESSION_ZLIB: u8 = 0x05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Zlib,
}

impl TryFrom<u8> for Compression {
    type Error = DecodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            COMPRESSION_NONE => Ok(Compression::None),
            COMPRESSION_ZLIB => Ok(Compression::Zlib),
            other => Err(DecodeError::Compression(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryHeader {
    pub compression: Compression,
    /// Hyphenated lowercase UUID of the schema version.
    pub schema_version_id: String,
}

/// Registry framing requires at least one payload byte after the header.
pub fn is_framed(raw: &[u8]) -> bool {
    raw.len() > HEADER_LEN && raw[0] == HEADER_VERSION
}

/// Split a framed payload into its header and the (inflated) Avro body.
pub fn unframe(raw: &[u8]) -> Result<(RegistryHeader, Cow<'_, [u8]>), DecodeError> {
    if !is_framed(raw) {
        return Err(DecodeError::Header(format!(
            "expected version 0x{HEADER_VERSION:02x} and more than {HEADER_LEN} bytes, got {} bytes",
            raw.len()
        )));
    }

    let compression = Compression::try_from(raw[1])?;
    let schema_version_id = uuid::Uuid::from_slice(&raw[2..HEADER_LEN])
        .map_err(|e| DecodeError::Header(e.to_string()))?
        .to_string();

    let body = &raw[HEADER_LEN..];
    let body = match compression {
        Compression::None => Cow::Borrowed(body),
        Compression::Zlib => Cow::Owned(inflate(body, MAX_INFLATED)?),
    };

    Ok((
        RegistryHeader {
            compression,
            schema_version_id,
        },
        body,
    ))
}

/// Inflate a zlib body, reading at most one byte past `limit`.
fn inflate(body: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError> {
    let mut inflated = Vec::with_capacity(body.len().saturating_mul(2).min(limit));
    flate2::read::ZlibDecoder::new(body)
        .take(limit as u64 + 1)
        .read_to_end(&mut inflated)?;
    if inflated.len() > limit {
        return Err(DecodeError::InflatedTooLarge(limit));
    }
    Ok(inflated)
}

#[cfg(test)]
pub(crate) fn frame(compression: u8, schema_version: uuid::Uuid, body: &[u8]) -> Vec<u8> {
    let mut raw = vec![HEADER_VERSION, compression];
    raw.extend_from_slice(schema_version.as_bytes());
    raw.extend_from_slice(body);
    raw
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const VERSION: uuid::Uuid = uuid::Uuid::from_u128(0x6f1c_2a9e_0b3d_4f5a_8c7e_1d2b_3a4c_5d6e);

    #[test]
    fn test_is_framed_boundaries() {
        assert!(!is_framed(&[HEADER_VERSION; HEADER_LEN]));
        assert!(is_framed(&[HEADER_VERSION; HEADER_LEN + 1]));
        let mut wrong_version = vec![0x02; HEADER_LEN + 5];
        assert!(!is_framed(&wrong_version));
        wrong_version[0] = HEADER_VERSION;
        assert!(is_framed(&wrong_version));
        assert!(!is_framed(&[]));
    }

    #[test]
    fn test_unframe_uncompressed() {
        let raw = frame(0x00, VERSION, b"payload");
        let (header, body) = unframe(&raw).unwrap();
        assert_eq!(header.compression, Compression::None);
        assert_eq!(header.schema_version_id, "6f1c2a9e-0b3d-4f5a-8c7e-1d2b3a4c5d6e");
        assert_eq!(&*body, b"payload");
    }

    #[test]
    fn test_unframe_zlib() {
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"compressed payload").unwrap();
        let compressed = encoder.finish().unwrap();

        let raw = frame(0x05, VERSION, &compressed);
        let (header, body) = unframe(&raw).unwrap();
        assert_eq!(header.compression, Compression::Zlib);
        assert_eq!(&*body, b"compressed payload");
    }

    #[test]
    fn test_unframe_rejects_unknown_compression() {
        let raw = frame(0x09, VERSION, b"x");
        assert!(matches!(unframe(&raw), Err(DecodeError::Compression(0x09))));
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::best());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_inflate_limit_is_inclusive() {
        let body = zlib(&[7u8; 64]);
        assert_eq!(inflate(&body, 64).unwrap().len(), 64);
        assert!(matches!(inflate(&body, 63), Err(DecodeError::InflatedTooLarge(63))));
    }

    #[test]
    fn test_unframe_rejects_zlib_bomb() {
        let bomb = zlib(&vec![0u8; MAX_INFLATED + 4096]);
        assert!(bomb.len() < MAX_INFLATED / 100);

        let raw = frame(0x05, VERSION, &bomb);
        assert!(matches!(
            unframe(&raw),
            Err(DecodeError::InflatedTooLarge(MAX_INFLATED))
        ));
    }

    #[test]
    fn test_unframe_rejects_corrupt_zlib() {
        let raw = frame(0x05, VERSION, b"not zlib at all");
        assert!(matches!(unframe(&raw), Err(DecodeError::Inflate(_))));
    }
}
