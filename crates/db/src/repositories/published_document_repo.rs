//! Repository for the published namespace.
//!
//! Owns four tables: the `published_documents` version line, its meta-only
//! mirror `published_document_metas`, and the two single-row-per-id latest
//! projections. `publish` keeps all four consistent in the caller's
//! transaction.

use std::collections::{HashMap, HashSet};

use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::models::published_document::{
    IdVersion, LatestPublishedDocument, LatestPublishedDocumentMeta, NewPublishedDocument,
    PublishedDocument, PublishedDocumentMeta,
};

const COLUMNS: &str = "id, project_id, version, meta, content, links, children, \
    latest, unpublished, created_at, updated_at";

const META_COLUMNS: &str = "id, project_id, version, meta, links, children, \
    latest, unpublished, created_at, updated_at";

const LATEST_COLUMNS: &str = "id, project_id, version, meta, content, links, children, \
    created_at, updated_at";

const LATEST_META_COLUMNS: &str = "id, project_id, version, meta, links, children, \
    created_at, updated_at";

/// Provides the atomic publish write and the published-namespace reads.
pub struct PublishedDocumentRepo;

impl PublishedDocumentRepo {
    /// Publish a new version: clear `latest` on all prior rows for this id
    /// in both published tables, upsert both latest projections, then insert
    /// the new versioned row in both tables with `latest = true`.
    ///
    /// Must run inside the engine's transaction; a duplicate `(id, version)`
    /// surfaces as a unique violation for the engine to classify.
    pub async fn publish(
        conn: &mut PgConnection,
        input: &NewPublishedDocument,
    ) -> Result<PublishedDocument, sqlx::Error> {
        sqlx::query("UPDATE published_documents SET latest = FALSE WHERE id = $1 AND latest = TRUE")
            .bind(input.id)
            .execute(&mut *conn)
            .await?;
        sqlx::query(
            "UPDATE published_document_metas SET latest = FALSE WHERE id = $1 AND latest = TRUE",
        )
        .bind(input.id)
        .execute(&mut *conn)
        .await?;

        Self::upsert_latest_projections(&mut *conn, input).await?;

        sqlx::query(
            "INSERT INTO published_document_metas
                (id, project_id, version, meta, links, children, latest)
             VALUES ($1, $2, $3, $4, $5, $6, TRUE)",
        )
        .bind(input.id)
        .bind(input.project_id)
        .bind(&input.version)
        .bind(&input.meta)
        .bind(&input.links)
        .bind(&input.children)
        .execute(&mut *conn)
        .await?;

        let query = format!(
            "INSERT INTO published_documents
                (id, project_id, version, meta, content, links, children, latest)
             VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PublishedDocument>(&query)
            .bind(input.id)
            .bind(input.project_id)
            .bind(&input.version)
            .bind(&input.meta)
            .bind(&input.content)
            .bind(&input.links)
            .bind(&input.children)
            .fetch_one(&mut *conn)
            .await
    }

    /// Find one published snapshot by id and exact SemVer.
    pub async fn find_by_version(
        executor: impl PgExecutor<'_>,
        id: Uuid,
        version: &str,
    ) -> Result<Option<PublishedDocument>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM published_documents WHERE id = $1 AND version = $2");
        sqlx::query_as::<_, PublishedDocument>(&query)
            .bind(id)
            .bind(version)
            .fetch_optional(executor)
            .await
    }

    /// Find the meta-only snapshot by id and exact SemVer.
    pub async fn find_meta_by_version(
        executor: impl PgExecutor<'_>,
        id: Uuid,
        version: &str,
    ) -> Result<Option<PublishedDocumentMeta>, sqlx::Error> {
        let query = format!(
            "SELECT {META_COLUMNS} FROM published_document_metas WHERE id = $1 AND version = $2"
        );
        sqlx::query_as::<_, PublishedDocumentMeta>(&query)
            .bind(id)
            .bind(version)
            .fetch_optional(executor)
            .await
    }

    /// The latest-published projection for one id.
    pub async fn find_latest(
        executor: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<LatestPublishedDocument>, sqlx::Error> {
        let query = format!("SELECT {LATEST_COLUMNS} FROM latest_published_documents WHERE id = $1");
        sqlx::query_as::<_, LatestPublishedDocument>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// The meta-only latest projection for one id.
    pub async fn find_latest_meta(
        executor: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<LatestPublishedDocumentMeta>, sqlx::Error> {
        let query = format!(
            "SELECT {LATEST_META_COLUMNS} FROM latest_published_document_metas WHERE id = $1"
        );
        sqlx::query_as::<_, LatestPublishedDocumentMeta>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Every latest-published document in a project.
    pub async fn list_latest_by_project(
        executor: impl PgExecutor<'_>,
        project_id: Uuid,
    ) -> Result<Vec<LatestPublishedDocumentMeta>, sqlx::Error> {
        let query = format!(
            "SELECT {LATEST_META_COLUMNS} FROM latest_published_document_metas
             WHERE project_id = $1
             ORDER BY updated_at DESC"
        );
        sqlx::query_as::<_, LatestPublishedDocumentMeta>(&query)
            .bind(project_id)
            .fetch_all(executor)
            .await
    }

    /// A document's published version history, newest first.
    pub async fn list_versions(
        executor: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Vec<PublishedDocumentMeta>, sqlx::Error> {
        let query = format!(
            "SELECT {META_COLUMNS} FROM published_document_metas
             WHERE id = $1
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, PublishedDocumentMeta>(&query)
            .bind(id)
            .fetch_all(executor)
            .await
    }

    /// Full published documents for an explicit `(id, version)` list within
    /// one project.
    pub async fn list_by_id_versions(
        executor: impl PgExecutor<'_>,
        project_id: Uuid,
        pairs: &[IdVersion],
    ) -> Result<Vec<PublishedDocument>, sqlx::Error> {
        let ids: Vec<Uuid> = pairs.iter().map(|p| p.id).collect();
        let versions: Vec<String> = pairs.iter().map(|p| p.version.clone()).collect();
        let query = format!(
            "SELECT {COLUMNS} FROM published_documents
             WHERE project_id = $1
               AND (id, version) IN (SELECT * FROM UNNEST($2::uuid[], $3::text[]))
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, PublishedDocument>(&query)
            .bind(project_id)
            .bind(&ids)
            .bind(&versions)
            .fetch_all(executor)
            .await
    }

    /// Whether every `(id, version)` pair exists in the published namespace.
    pub async fn exists_published_all(
        executor: impl PgExecutor<'_>,
        pairs: &[IdVersion],
    ) -> Result<bool, sqlx::Error> {
        let unique: HashSet<&IdVersion> = pairs.iter().collect();
        let ids: Vec<Uuid> = pairs.iter().map(|p| p.id).collect();
        let versions: Vec<String> = pairs.iter().map(|p| p.version.clone()).collect();
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM published_documents
             WHERE (id, version) IN (SELECT * FROM UNNEST($1::uuid[], $2::text[]))",
        )
        .bind(&ids)
        .bind(&versions)
        .fetch_one(executor)
        .await?;
        Ok(found as usize == unique.len())
    }

    /// Resolve the owning project for each given published document ID.
    pub async fn project_ids_for(
        executor: impl PgExecutor<'_>,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Uuid>, sqlx::Error> {
        let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(
            "SELECT DISTINCT id, project_id FROM published_documents WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(executor)
        .await?;
        Ok(rows.into_iter().collect())
    }

    /// Remove one published version from both published tables. If the
    /// removed version was the latest, the latest projections are repointed
    /// to the newest remaining version, or dropped when none remains.
    ///
    /// Returns `false` when the version does not exist.
    pub async fn unpublish(
        conn: &mut PgConnection,
        id: Uuid,
        version: &str,
    ) -> Result<bool, sqlx::Error> {
        let removed =
            sqlx::query("DELETE FROM published_documents WHERE id = $1 AND version = $2")
                .bind(id)
                .bind(version)
                .execute(&mut *conn)
                .await?;
        sqlx::query("DELETE FROM published_document_metas WHERE id = $1 AND version = $2")
            .bind(id)
            .bind(version)
            .execute(&mut *conn)
            .await?;
        if removed.rows_affected() == 0 {
            return Ok(false);
        }

        let latest_version: Option<String> =
            sqlx::query_scalar("SELECT version FROM latest_published_documents WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        if latest_version.as_deref() != Some(version) {
            return Ok(true);
        }

        // The removed version was the latest; repoint to the newest survivor.
        let query = format!(
            "SELECT {COLUMNS} FROM published_documents
             WHERE id = $1
             ORDER BY created_at DESC
             LIMIT 1"
        );
        let survivor = sqlx::query_as::<_, PublishedDocument>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match survivor {
            Some(doc) => {
                let next = NewPublishedDocument {
                    id: doc.id,
                    project_id: doc.project_id,
                    version: doc.version.clone(),
                    meta: doc.meta.clone(),
                    content: doc.content.clone(),
                    links: doc.links.clone(),
                    children: doc.children.clone(),
                };
                sqlx::query(
                    "UPDATE published_documents SET latest = TRUE WHERE id = $1 AND version = $2",
                )
                .bind(doc.id)
                .bind(&doc.version)
                .execute(&mut *conn)
                .await?;
                sqlx::query(
                    "UPDATE published_document_metas SET latest = TRUE WHERE id = $1 AND version = $2",
                )
                .bind(doc.id)
                .bind(&doc.version)
                .execute(&mut *conn)
                .await?;
                Self::upsert_latest_projections(&mut *conn, &next).await?;
            }
            None => {
                sqlx::query("DELETE FROM latest_published_documents WHERE id = $1")
                    .bind(id)
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("DELETE FROM latest_published_document_metas WHERE id = $1")
                    .bind(id)
                    .execute(&mut *conn)
                    .await?;
            }
        }
        Ok(true)
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    /// Upsert both latest projections from the given snapshot.
    async fn upsert_latest_projections(
        conn: &mut PgConnection,
        input: &NewPublishedDocument,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO latest_published_documents
                (id, project_id, version, meta, content, links, children)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO UPDATE SET
                project_id = EXCLUDED.project_id,
                version = EXCLUDED.version,
                meta = EXCLUDED.meta,
                content = EXCLUDED.content,
                links = EXCLUDED.links,
                children = EXCLUDED.children",
        )
        .bind(input.id)
        .bind(input.project_id)
        .bind(&input.version)
        .bind(&input.meta)
        .bind(&input.content)
        .bind(&input.links)
        .bind(&input.children)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            "INSERT INTO latest_published_document_metas
                (id, project_id, version, meta, links, children)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO UPDATE SET
                project_id = EXCLUDED.project_id,
                version = EXCLUDED.version,
                meta = EXCLUDED.meta,
                links = EXCLUDED.links,
                children = EXCLUDED.children",
        )
        .bind(input.id)
        .bind(input.project_id)
        .bind(&input.version)
        .bind(&input.meta)
        .bind(&input.links)
        .bind(&input.children)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}
