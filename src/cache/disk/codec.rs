//! Blob Codec
//!
//! Serialization and optional LZ4 compression of persisted values, plus the
//! content-addressed blob file naming.

use sha2::{Digest, Sha256};

use crate::cache::CacheValue;
use crate::error::{CacheError, Result};

pub const BLOB_EXTENSION: &str = "cache";

/// `<sha256(key) hex>.cache`
pub fn blob_file_name(key: &str) -> String {
    format!("{}.{}", hex::encode(Sha256::digest(key.as_bytes())), BLOB_EXTENSION)
}

/// Serializes a value, LZ4 compressing it (size-prefixed block) if asked.
pub fn encode(value: &CacheValue, compress: bool) -> Result<Vec<u8>> {
    let bytes = serde_json::to_vec(value)?;
    if !compress {
        return Ok(bytes);
    }
    lz4::block::compress(&bytes, Some(lz4::block::CompressionMode::DEFAULT), true)
        .map_err(|e| CacheError::Compression(e.to_string()))
}

pub fn decode(bytes: &[u8], compressed: bool) -> Result<CacheValue> {
    if compressed {
        let raw = lz4::block::decompress(bytes, None)
            .map_err(|e| CacheError::Compression(e.to_string()))?;
        Ok(serde_json::from_slice(&raw)?)
    } else {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blob_file_name_is_stable_hex() {
        let name = blob_file_name("600000:sma:20");
        assert_eq!(name, blob_file_name("600000:sma:20"));
        assert_ne!(name, blob_file_name("600000:sma:21"));
        assert!(name.ends_with(".cache"));
        assert_eq!(name.len(), 64 + ".cache".len());
    }

    #[test]
    fn test_compression_shrinks_repetitive_payloads() {
        let rows: Vec<_> = (0..200)
            .map(|i| json!({"symbol": "600000", "close": 10.5, "day": i}))
            .collect();
        let value = json!(rows);

        let plain = encode(&value, false).unwrap();
        let packed = encode(&value, true).unwrap();

        assert!(packed.len() < plain.len());
        assert_eq!(decode(&packed, true).unwrap(), value);
        assert_eq!(decode(&plain, false).unwrap(), value);
    }

    #[test]
    fn test_decode_garbage_is_an_error() {
        assert!(decode(b"\x05\x00\x00\x00garbage", true).is_err());
        assert!(decode(b"{oops", false).is_err());
    }
}
