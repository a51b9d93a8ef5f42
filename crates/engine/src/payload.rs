//! Encoding and decoding of payload blobs.
//!
//! Text fields (meta, content) round-trip as UTF-8 through the codec. The
//! links mapping is serialized from a `BTreeMap` and children from a `Vec`,
//! so encodings are deterministic and the byte-equality guards (no-change,
//! idempotent publish) are meaningful.

use std::collections::BTreeMap;

use vellum_core::codec::Codec;
use vellum_core::error::CoreError;

pub(crate) fn encode_text(codec: &dyn Codec, text: &str) -> Result<Vec<u8>, CoreError> {
    codec.encode(text.as_bytes())
}

pub(crate) fn decode_text(codec: &dyn Codec, blob: &[u8]) -> Result<String, CoreError> {
    let bytes = codec.decode(blob)?;
    String::from_utf8(bytes).map_err(|_| CoreError::Internal("payload is not valid UTF-8".into()))
}

pub(crate) fn encode_links(
    codec: &dyn Codec,
    links: &BTreeMap<String, String>,
) -> Result<Vec<u8>, CoreError> {
    let json = serde_json::to_vec(links).map_err(|e| CoreError::Internal(e.to_string()))?;
    codec.encode(&json)
}

pub(crate) fn decode_links(
    codec: &dyn Codec,
    blob: &[u8],
) -> Result<BTreeMap<String, String>, CoreError> {
    let bytes = codec.decode(blob)?;
    if bytes.is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| CoreError::Internal(format!("stored links are not a JSON mapping: {e}")))
}

pub(crate) fn encode_children(
    codec: &dyn Codec,
    children: &[String],
) -> Result<Vec<u8>, CoreError> {
    let json = serde_json::to_vec(children).map_err(|e| CoreError::Internal(e.to_string()))?;
    codec.encode(&json)
}

pub(crate) fn decode_children(codec: &dyn Codec, blob: &[u8]) -> Result<Vec<String>, CoreError> {
    let bytes = codec.decode(blob)?;
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| CoreError::Internal(format!("stored children are not a JSON sequence: {e}")))
}
