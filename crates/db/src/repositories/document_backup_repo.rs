//! Repository for the `document_backups` table.

use std::collections::{HashMap, HashSet};

use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;
use vellum_core::types::Timestamp;

use crate::models::document_backup::{DocumentBackup, NewDocumentBackup};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, version, meta, content, links, children, \
    kind, compression, created_at, updated_at";

/// Provides snapshot creation, history queries, and the retention job's
/// bulk delete.
pub struct DocumentBackupRepo;

impl DocumentBackupRepo {
    /// Insert a backup snapshot of a document at a given integer version.
    pub async fn create(
        executor: impl PgExecutor<'_>,
        input: &NewDocumentBackup,
    ) -> Result<DocumentBackup, sqlx::Error> {
        let query = format!(
            "INSERT INTO document_backups
                (id, version, meta, content, links, children, kind, compression)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DocumentBackup>(&query)
            .bind(input.id)
            .bind(input.version)
            .bind(&input.meta)
            .bind(&input.content)
            .bind(&input.links)
            .bind(&input.children)
            .bind(&input.kind)
            .bind(&input.compression)
            .fetch_one(executor)
            .await
    }

    /// List a document's backups, newest version first.
    pub async fn list_by_document(
        executor: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Vec<DocumentBackup>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM document_backups WHERE id = $1 ORDER BY version DESC"
        );
        sqlx::query_as::<_, DocumentBackup>(&query)
            .bind(id)
            .fetch_all(executor)
            .await
    }

    /// List just the backup versions for a document, newest first, with
    /// their creation timestamps.
    pub async fn list_versions(
        executor: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Vec<(i64, Timestamp)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT version, created_at FROM document_backups WHERE id = $1 ORDER BY version DESC",
        )
        .bind(id)
        .fetch_all(executor)
        .await
    }

    /// Find one backup by document ID and version.
    pub async fn find(
        executor: impl PgExecutor<'_>,
        id: Uuid,
        version: i64,
    ) -> Result<Option<DocumentBackup>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM document_backups WHERE id = $1 AND version = $2");
        sqlx::query_as::<_, DocumentBackup>(&query)
            .bind(id)
            .bind(version)
            .fetch_optional(executor)
            .await
    }

    /// Delete one backup. Returns `true` if a row was removed.
    pub async fn delete(
        executor: impl PgExecutor<'_>,
        id: Uuid,
        version: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM document_backups WHERE id = $1 AND version = $2")
            .bind(id)
            .bind(version)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Purge every backup of a document. Returns the number of rows removed.
    pub async fn delete_by_document(
        executor: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM document_backups WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// All backups whose `updated_at` falls in `[start, end]`, ascending.
    /// The retention sweep depends on this ordering.
    pub async fn list_updated_between(
        executor: impl PgExecutor<'_>,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<DocumentBackup>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM document_backups
             WHERE updated_at >= $1 AND updated_at <= $2
             ORDER BY updated_at ASC"
        );
        sqlx::query_as::<_, DocumentBackup>(&query)
            .bind(start)
            .bind(end)
            .fetch_all(executor)
            .await
    }

    /// Bulk-delete backups, one statement per document ID. A failure on one
    /// ID is logged and the sweep continues with the rest; the total number
    /// of deleted rows is returned.
    pub async fn bulk_delete(
        conn: &mut PgConnection,
        removals: &HashMap<Uuid, HashSet<i64>>,
    ) -> Result<u64, sqlx::Error> {
        let mut deleted = 0u64;
        for (id, versions) in removals {
            let versions: Vec<i64> = versions.iter().copied().collect();
            let result = sqlx::query("DELETE FROM document_backups WHERE id = $1 AND version = ANY($2)")
                .bind(id)
                .bind(&versions)
                .execute(&mut *conn)
                .await;
            match result {
                Ok(res) => deleted += res.rows_affected(),
                Err(e) => {
                    tracing::warn!(document_id = %id, error = %e, "backup bulk delete failed for one document");
                }
            }
        }
        Ok(deleted)
    }
}
