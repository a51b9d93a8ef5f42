//! Payload blob codec.
//!
//! Every document payload field (meta, content, links, children) is stored
//! as an opaque, codec-encoded blob. The codec is pluggable; the store and
//! engines only require `encode` / `decode` and never inspect encoded bytes.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::CoreError;

pub trait Codec: Send + Sync {
    /// Codec identifier recorded on stored documents (`compression` column).
    fn name(&self) -> &'static str;

    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CoreError>;

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CoreError>;
}

/// Pass-through codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopCodec;

impl Codec for NopCodec {
    fn name(&self) -> &'static str {
        "nop"
    }

    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CoreError> {
        Ok(data.to_vec())
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CoreError> {
        Ok(data.to_vec())
    }
}

/// Gzip codec backed by flate2.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipCodec;

impl Codec for GzipCodec {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CoreError> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(data)
            .map_err(|e| CoreError::Internal(format!("gzip encode failed: {e}")))?;
        encoder
            .finish()
            .map_err(|e| CoreError::Internal(format!("gzip encode failed: {e}")))
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CoreError> {
        let mut decoder = GzDecoder::new(data);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| CoreError::Internal(format!("gzip decode failed: {e}")))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nop_round_trip() {
        let codec = NopCodec;
        let data = b"hello world";
        let encoded = codec.encode(data).unwrap();
        assert_eq!(encoded, data);
        assert_eq!(codec.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn gzip_round_trip() {
        let codec = GzipCodec;
        let data = br#"{"title":"a reasonably long meta blob that compresses"}"#;
        let encoded = codec.encode(data).unwrap();
        assert_ne!(encoded, data.to_vec());
        assert_eq!(codec.decode(&encoded).unwrap(), data.to_vec());
    }

    #[test]
    fn gzip_round_trips_empty_input() {
        let codec = GzipCodec;
        let encoded = codec.encode(b"").unwrap();
        assert_eq!(codec.decode(&encoded).unwrap(), b"");
    }

    #[test]
    fn gzip_rejects_garbage() {
        let codec = GzipCodec;
        assert!(codec.decode(b"definitely not gzip").is_err());
    }
}
