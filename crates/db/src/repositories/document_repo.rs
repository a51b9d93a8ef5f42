//! Repository for the `documents` table.
//!
//! The version-conditioned `update_payload` is the optimistic-concurrency
//! primitive: it only writes when the row still carries the version the
//! caller read inside its transaction, and reports success through the
//! affected-row count.

use std::collections::{HashMap, HashSet};

use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::document::{Document, DocumentPayload, NewDocument};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, project_id, version, meta, content, links, children, \
    kind, compression, created_at, updated_at, deleted_at";

/// Provides CRUD and existence checks for working documents.
pub struct DocumentRepo;

impl DocumentRepo {
    /// Insert a new working document at version 0.
    pub async fn create(
        executor: impl PgExecutor<'_>,
        input: &NewDocument,
    ) -> Result<Document, sqlx::Error> {
        let query = format!(
            "INSERT INTO documents
                (id, project_id, version, meta, content, links, children, kind, compression)
             VALUES ($1, $2, 0, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(input.id)
            .bind(input.project_id)
            .bind(&input.meta)
            .bind(&input.content)
            .bind(&input.links)
            .bind(&input.children)
            .bind(&input.kind)
            .bind(&input.compression)
            .fetch_one(executor)
            .await
    }

    /// Find a document by ID. Excludes soft-deleted rows.
    pub async fn find_by_id(
        executor: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Document>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM documents WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, Document>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// List a project's documents, newest first. Excludes soft-deleted rows.
    pub async fn list_by_project(
        executor: impl PgExecutor<'_>,
        project_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Document>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM documents
             WHERE project_id = $1 AND deleted_at IS NULL
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(project_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    /// Total live documents in a project, for the listing's total count.
    pub async fn count_by_project(
        executor: impl PgExecutor<'_>,
        project_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM documents WHERE project_id = $1 AND deleted_at IS NULL",
        )
        .bind(project_id)
        .fetch_one(executor)
        .await
    }

    /// Fetch documents by explicit IDs. Excludes soft-deleted rows.
    pub async fn list_by_ids(
        executor: impl PgExecutor<'_>,
        ids: &[Uuid],
    ) -> Result<Vec<Document>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM documents
             WHERE id = ANY($1) AND deleted_at IS NULL
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(ids)
            .fetch_all(executor)
            .await
    }

    /// Write the payload and bump the version, conditioned on the row still
    /// being at `expected_version`. Returns `false` when another writer got
    /// there first.
    pub async fn update_payload(
        executor: impl PgExecutor<'_>,
        id: Uuid,
        expected_version: i64,
        payload: &DocumentPayload,
        new_version: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE documents
             SET meta = $3, content = $4, links = $5, children = $6, version = $7
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(expected_version)
        .bind(&payload.meta)
        .bind(&payload.content)
        .bind(&payload.links)
        .bind(&payload.children)
        .bind(new_version)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete a document. Returns `true` if a live row was tombstoned.
    pub async fn soft_delete(
        executor: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE documents SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .execute(executor)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Permanently delete a document row. Returns `true` if a row was removed.
    pub async fn hard_delete(
        executor: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether every given ID exists as a live working document.
    pub async fn exists_all(
        executor: impl PgExecutor<'_>,
        ids: &[Uuid],
    ) -> Result<bool, sqlx::Error> {
        let unique: HashSet<Uuid> = ids.iter().copied().collect();
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM documents WHERE id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(ids)
        .fetch_one(executor)
        .await?;
        Ok(found as usize == unique.len())
    }

    /// Resolve the owning project for each given document ID. IDs that do
    /// not resolve are absent from the map.
    pub async fn project_ids_for(
        executor: impl PgExecutor<'_>,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Uuid>, sqlx::Error> {
        let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(
            "SELECT id, project_id FROM documents WHERE id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(ids)
        .fetch_all(executor)
        .await?;
        Ok(rows.into_iter().collect())
    }
}
