//! Backup engine: snapshot history queries and restore.
//!
//! Restore is deliberately thin: it replays the snapshot through the
//! document engine's overwrite update, so backup creation, the version
//! bump, and link reconciliation apply to a restore exactly as they do to
//! any other write.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use vellum_core::codec::Codec;
use vellum_core::error::CoreError;
use vellum_core::types::Timestamp;

use vellum_db::models::document_backup::DocumentBackup;
use vellum_db::repositories::DocumentBackupRepo;
use vellum_db::DbPool;

use crate::document::{DocumentEngine, UpdateDocument, UpdateKind, UpdateOutcome, OVERWRITE_VERSION};
use crate::error::{parse_uuid, EngineResult};
use crate::payload::{decode_children, decode_links, decode_text};

/// A fully decoded backup snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentBackupView {
    pub id: Uuid,
    pub version: i64,
    pub meta: String,
    pub content: String,
    pub links: BTreeMap<String, String>,
    pub children: Vec<String>,
    pub created_at: Timestamp,
}

/// Snapshot history queries and restore.
#[derive(Clone)]
pub struct BackupEngine {
    pool: DbPool,
    codec: Arc<dyn Codec>,
    documents: DocumentEngine,
}

impl BackupEngine {
    pub fn new(pool: DbPool, codec: Arc<dyn Codec>) -> Self {
        let documents = DocumentEngine::new(pool.clone(), codec.clone());
        Self {
            pool,
            codec,
            documents,
        }
    }

    /// List a document's backups, newest first.
    pub async fn list_backups(&self, document_id: &str) -> EngineResult<Vec<DocumentBackupView>> {
        let id = parse_uuid(document_id, "document_id")?;
        let backups = DocumentBackupRepo::list_by_document(&self.pool, id).await?;
        backups.into_iter().map(|b| self.view(b)).collect()
    }

    /// Fetch one backup snapshot with decoded payload.
    pub async fn get_backup(
        &self,
        document_id: &str,
        version: i64,
    ) -> EngineResult<DocumentBackupView> {
        let id = parse_uuid(document_id, "document_id")?;
        let backup = DocumentBackupRepo::find(&self.pool, id, version)
            .await?
            .ok_or_else(|| {
                CoreError::not_found("DocumentBackup", format!("{document_id}@{version}"))
            })?;
        self.view(backup)
    }

    /// Delete one backup snapshot.
    pub async fn delete_backup(&self, document_id: &str, version: i64) -> EngineResult<Uuid> {
        let id = parse_uuid(document_id, "document_id")?;
        let deleted = DocumentBackupRepo::delete(&self.pool, id, version).await?;
        if !deleted {
            return Err(CoreError::not_found(
                "DocumentBackup",
                format!("{document_id}@{version}"),
            )
            .into());
        }
        tracing::info!(document_id = %id, version, "deleted document backup");
        Ok(id)
    }

    /// Restore a snapshot by overwriting the working document with its
    /// payload. The document's version clock still advances, and the
    /// pre-restore state is itself backed up by the update path.
    pub async fn restore_backup(
        &self,
        document_id: &str,
        version: i64,
    ) -> EngineResult<UpdateOutcome> {
        let id = parse_uuid(document_id, "document_id")?;
        let backup = DocumentBackupRepo::find(&self.pool, id, version)
            .await?
            .ok_or_else(|| {
                CoreError::not_found("DocumentBackup", format!("{document_id}@{version}"))
            })?;

        let codec = self.codec.as_ref();
        let outcome = self
            .documents
            .update(UpdateDocument {
                document_id: document_id.to_string(),
                version: OVERWRITE_VERSION,
                meta: Some(decode_text(codec, &backup.meta)?),
                content: Some(decode_text(codec, &backup.content)?),
                links: Some(decode_links(codec, &backup.links)?),
                children: Some(decode_children(codec, &backup.children)?),
                kind: UpdateKind::Text,
            })
            .await?;

        tracing::info!(
            document_id = %id,
            restored_version = version,
            new_version = outcome.version,
            "restored document from backup"
        );
        Ok(outcome)
    }

    fn view(&self, backup: DocumentBackup) -> EngineResult<DocumentBackupView> {
        let codec = self.codec.as_ref();
        Ok(DocumentBackupView {
            id: backup.id,
            version: backup.version,
            meta: decode_text(codec, &backup.meta)?,
            content: decode_text(codec, &backup.content)?,
            links: decode_links(codec, &backup.links)?,
            children: decode_children(codec, &backup.children)?,
            created_at: backup.created_at,
        })
    }
}
