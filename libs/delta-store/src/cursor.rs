//! Opaque pagination cursors: base64url-encoded JSON of the last evaluated key.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;

pub fn encode<K: Serialize>(key: &K) -> String {
    // Serializing plain tuples of strings and integers cannot fail.
    let json = serde_json::to_vec(key).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

pub fn decode<K: DeserializeOwned>(cursor: &str) -> Result<K, StoreError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|e| StoreError::InvalidCursor(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::InvalidCursor(e.to_string()))
}

/// Decode an optional cursor.
pub fn decode_opt<K: DeserializeOwned>(cursor: Option<&str>) -> Result<Option<K>, StoreError> {
    cursor.map(decode::<K>).transpose()
}
