//! Repository for the `links` table (draft-space outgoing links).

use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::models::link::{Link, NewLink};

const COLUMNS: &str = "source_id, target_id, target_version, created_at";

/// Provides upsert, delete, and query-by-target for draft links.
pub struct LinkRepo;

impl LinkRepo {
    /// Upsert links on their full key. Duplicates are left untouched.
    pub async fn upsert_many(
        conn: &mut PgConnection,
        links: &[NewLink],
    ) -> Result<(), sqlx::Error> {
        for link in links {
            sqlx::query(
                "INSERT INTO links (source_id, target_id, target_version)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (source_id, target_id, target_version) DO NOTHING",
            )
            .bind(link.source_id)
            .bind(link.target_id)
            .bind(&link.target_version)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Delete links by their full key.
    pub async fn delete_many(
        conn: &mut PgConnection,
        links: &[NewLink],
    ) -> Result<(), sqlx::Error> {
        for link in links {
            sqlx::query(
                "DELETE FROM links
                 WHERE source_id = $1 AND target_id = $2 AND target_version = $3",
            )
            .bind(link.source_id)
            .bind(link.target_id)
            .bind(&link.target_version)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Remove every outgoing link of a source document.
    pub async fn delete_by_source(
        executor: impl PgExecutor<'_>,
        source_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM links WHERE source_id = $1")
            .bind(source_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// All links pointing at the given target document.
    pub async fn list_backlinks(
        executor: impl PgExecutor<'_>,
        target_id: Uuid,
    ) -> Result<Vec<Link>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM links WHERE target_id = $1 ORDER BY source_id, target_version"
        );
        sqlx::query_as::<_, Link>(&query)
            .bind(target_id)
            .fetch_all(executor)
            .await
    }
}
