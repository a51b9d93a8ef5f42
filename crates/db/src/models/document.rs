use sqlx::FromRow;
use uuid::Uuid;
use vellum_core::types::Timestamp;

/// A row from the `documents` table: the mutable head of a document.
#[derive(Debug, Clone, FromRow)]
pub struct Document {
    pub id: Uuid,
    pub project_id: Uuid,
    pub version: i64,
    pub meta: Vec<u8>,
    pub content: Vec<u8>,
    pub links: Vec<u8>,
    pub children: Vec<u8>,
    pub kind: String,
    pub compression: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

/// Insert DTO for a new working document. The version clock starts at 0.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: Uuid,
    pub project_id: Uuid,
    pub meta: Vec<u8>,
    pub content: Vec<u8>,
    pub links: Vec<u8>,
    pub children: Vec<u8>,
    pub kind: String,
    pub compression: String,
}

/// The four payload blobs written by a version-checked update.
#[derive(Debug, Clone)]
pub struct DocumentPayload {
    pub meta: Vec<u8>,
    pub content: Vec<u8>,
    pub links: Vec<u8>,
    pub children: Vec<u8>,
}

impl Document {
    pub fn payload(&self) -> DocumentPayload {
        DocumentPayload {
            meta: self.meta.clone(),
            content: self.content.clone(),
            links: self.links.clone(),
            children: self.children.clone(),
        }
    }
}

impl DocumentPayload {
    /// Byte-equality against a document row, the basis of the no-change
    /// guard and the idempotent-publish check.
    pub fn matches(&self, doc: &Document) -> bool {
        self.meta == doc.meta
            && self.content == doc.content
            && self.links == doc.links
            && self.children == doc.children
    }
}
