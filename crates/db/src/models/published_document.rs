use sqlx::FromRow;
use uuid::Uuid;
use vellum_core::types::Timestamp;

/// A row from the `published_documents` table: one immutable snapshot on a
/// document's published version line. `version` is a SemVer string.
#[derive(Debug, Clone, FromRow)]
pub struct PublishedDocument {
    pub id: Uuid,
    pub project_id: Uuid,
    pub version: String,
    pub meta: Vec<u8>,
    pub content: Vec<u8>,
    pub links: Vec<u8>,
    pub children: Vec<u8>,
    pub latest: bool,
    pub unpublished: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from `published_document_metas`: the version line minus content,
/// for cheap listings.
#[derive(Debug, Clone, FromRow)]
pub struct PublishedDocumentMeta {
    pub id: Uuid,
    pub project_id: Uuid,
    pub version: String,
    pub meta: Vec<u8>,
    pub links: Vec<u8>,
    pub children: Vec<u8>,
    pub latest: bool,
    pub unpublished: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Single-row-per-id projection of the most recently published version.
#[derive(Debug, Clone, FromRow)]
pub struct LatestPublishedDocument {
    pub id: Uuid,
    pub project_id: Uuid,
    pub version: String,
    pub meta: Vec<u8>,
    pub content: Vec<u8>,
    pub links: Vec<u8>,
    pub children: Vec<u8>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Meta-only variant of the latest projection.
#[derive(Debug, Clone, FromRow)]
pub struct LatestPublishedDocumentMeta {
    pub id: Uuid,
    pub project_id: Uuid,
    pub version: String,
    pub meta: Vec<u8>,
    pub links: Vec<u8>,
    pub children: Vec<u8>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Insert DTO for a publish: one new row on the version line (in both the
/// full and meta tables) plus the latest-projection upserts.
#[derive(Debug, Clone)]
pub struct NewPublishedDocument {
    pub id: Uuid,
    pub project_id: Uuid,
    pub version: String,
    pub meta: Vec<u8>,
    pub content: Vec<u8>,
    pub links: Vec<u8>,
    pub children: Vec<u8>,
}

/// An explicit `(id, version)` pair for batched published-document lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdVersion {
    pub id: Uuid,
    pub version: String,
}
