//! Row structs and insert DTOs.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row and a `New*` DTO for inserts. Payload fields hold codec-encoded
//! bytes; decoding belongs to the engine layer.

pub mod document;
pub mod document_backup;
pub mod link;
pub mod published_document;
