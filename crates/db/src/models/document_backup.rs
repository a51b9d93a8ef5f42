use sqlx::FromRow;
use uuid::Uuid;
use vellum_core::types::Timestamp;

use crate::models::document::Document;

/// A row from the `document_backups` table: an immutable snapshot of a
/// document at a prior integer version.
#[derive(Debug, Clone, FromRow)]
pub struct DocumentBackup {
    pub id: Uuid,
    pub version: i64,
    pub meta: Vec<u8>,
    pub content: Vec<u8>,
    pub links: Vec<u8>,
    pub children: Vec<u8>,
    pub kind: String,
    pub compression: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Insert DTO for a backup snapshot.
#[derive(Debug, Clone)]
pub struct NewDocumentBackup {
    pub id: Uuid,
    pub version: i64,
    pub meta: Vec<u8>,
    pub content: Vec<u8>,
    pub links: Vec<u8>,
    pub children: Vec<u8>,
    pub kind: String,
    pub compression: String,
}

impl NewDocumentBackup {
    /// Snapshot the pre-update state of a document row.
    pub fn of(doc: &Document) -> Self {
        NewDocumentBackup {
            id: doc.id,
            version: doc.version,
            meta: doc.meta.clone(),
            content: doc.content.clone(),
            links: doc.links.clone(),
            children: doc.children.clone(),
            kind: doc.kind.clone(),
            compression: doc.compression.clone(),
        }
    }
}
