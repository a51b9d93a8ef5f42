//! RFC 6902 JSON-patch application for patch-kind updates.

use crate::error::CoreError;

/// Apply a JSON patch to a JSON document, returning the patched document
/// re-serialized.
///
/// An empty document is treated as `{}`. Patches that do not parse or do not
/// cleanly apply are rejected; there is no partial acceptance.
pub fn apply_json_patch(document: &[u8], patch: &[u8]) -> Result<Vec<u8>, CoreError> {
    let base = if document.is_empty() {
        b"{}".as_slice()
    } else {
        document
    };

    let mut value: serde_json::Value = serde_json::from_slice(base)
        .map_err(|e| CoreError::InvalidArgument(format!("document is not valid JSON: {e}")))?;

    let patch: json_patch::Patch = serde_json::from_slice(patch)
        .map_err(|e| CoreError::InvalidArgument(format!("invalid JSON patch: {e}")))?;

    json_patch::patch(&mut value, &patch)
        .map_err(|e| CoreError::InvalidArgument(format!("patch does not apply: {e}")))?;

    serde_json::to_vec(&value).map_err(|e| CoreError::Internal(e.to_string()))
}
