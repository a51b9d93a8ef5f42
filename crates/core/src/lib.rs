//! Domain layer shared by the store and the engines.
//!
//! Everything here is free of I/O: the error taxonomy, the codec contract
//! for payload blobs, link-key parsing, published-version arithmetic, and
//! JSON-patch application.

pub mod codec;
pub mod error;
pub mod link;
pub mod patch;
pub mod types;
pub mod version;
