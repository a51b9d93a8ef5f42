use sqlx::FromRow;
use uuid::Uuid;
use vellum_core::types::Timestamp;

/// A row from the `links` table: one outgoing link in the draft space.
///
/// `target_version` is a SemVer string for links to published versions or
/// the sentinel `"current"` for links to the draft head.
#[derive(Debug, Clone, FromRow)]
pub struct Link {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub target_version: String,
    pub created_at: Timestamp,
}

/// Key-only DTO used for link upserts and deletes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLink {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub target_version: String,
}

/// A row from the `published_links` table: an outgoing link materialized at
/// publish time, with the source pinned to the published version.
#[derive(Debug, Clone, FromRow)]
pub struct PublishedLink {
    pub source_id: Uuid,
    pub source_version: String,
    pub target_id: Uuid,
    pub target_version: String,
    pub created_at: Timestamp,
}

/// Key-only DTO for published-link upserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPublishedLink {
    pub source_id: Uuid,
    pub source_version: String,
    pub target_id: Uuid,
    pub target_version: String,
}
