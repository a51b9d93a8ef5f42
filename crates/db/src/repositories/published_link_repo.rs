//! Repository for the `published_links` table.
//!
//! Rows are materialized from a document's link map at publish time; the
//! source side is pinned to the published SemVer while the target keeps
//! whatever token the draft carried (a SemVer or the `"current"` sentinel).

use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::models::link::{NewPublishedLink, PublishedLink};

const COLUMNS: &str = "source_id, source_version, target_id, target_version, created_at";

pub struct PublishedLinkRepo;

impl PublishedLinkRepo {
    /// Upsert published links on their full key.
    pub async fn upsert_many(
        conn: &mut PgConnection,
        links: &[NewPublishedLink],
    ) -> Result<(), sqlx::Error> {
        for link in links {
            sqlx::query(
                "INSERT INTO published_links (source_id, source_version, target_id, target_version)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (source_id, source_version, target_id, target_version) DO NOTHING",
            )
            .bind(link.source_id)
            .bind(&link.source_version)
            .bind(link.target_id)
            .bind(&link.target_version)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// All published links pointing at the given target id and version token.
    pub async fn list_backlinks(
        executor: impl PgExecutor<'_>,
        target_id: Uuid,
        target_version: &str,
    ) -> Result<Vec<PublishedLink>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM published_links
             WHERE target_id = $1 AND target_version = $2
             ORDER BY source_id, source_version"
        );
        sqlx::query_as::<_, PublishedLink>(&query)
            .bind(target_id)
            .bind(target_version)
            .fetch_all(executor)
            .await
    }
}
