//! Publish engine: promotes working documents into the published namespace.
//!
//! A publish appends one immutable SemVer snapshot to the document's version
//! line, repoints the latest projection, and materializes the document's
//! outgoing links as published links, all in one transaction. The cache is
//! written through after commit, best-effort.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use vellum_core::codec::Codec;
use vellum_core::error::CoreError;
use vellum_core::link::LinkKey;
use vellum_core::types::Timestamp;
use vellum_core::version;

use vellum_db::models::link::NewPublishedLink;
use vellum_db::models::published_document::{
    IdVersion, LatestPublishedDocument, LatestPublishedDocumentMeta, NewPublishedDocument,
    PublishedDocument, PublishedDocumentMeta,
};
use vellum_db::repositories::{DocumentRepo, PublishedDocumentRepo, PublishedLinkRepo};
use vellum_db::DbPool;

use crate::cache::Cache;
use crate::error::{is_unique_violation, parse_uuid, EngineError, EngineResult};
use crate::payload::{decode_children, decode_links, decode_text};

/// Version argument resolving to the latest projection.
const LATEST: &str = "latest";

// ── Requests ─────────────────────────────────────────────────────────────

/// Request to publish one document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishDocument {
    pub document_id: String,
    /// Explicit SemVer; computed (initial or patch-incremented) when absent.
    pub version: Option<String>,
    /// Republish even when the working document matches the latest publish.
    pub force: bool,
}

/// Request to publish several documents atomically, in order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishDocuments {
    pub document_ids: Vec<String>,
    pub version: Option<String>,
    pub force: bool,
}

// ── Responses ────────────────────────────────────────────────────────────

/// The most recent version on a document's published line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionDescriptor {
    pub version: String,
    pub created_at: Timestamp,
}

/// A fully decoded published document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedDocumentView {
    pub id: Uuid,
    pub project_id: Uuid,
    pub version: String,
    pub meta: String,
    pub content: String,
    pub links: BTreeMap<String, String>,
    pub children: Vec<String>,
    pub latest_version: Option<VersionDescriptor>,
}

/// Meta-only published document (no content).
#[derive(Debug, Clone, Serialize)]
pub struct PublishedDocumentMetaView {
    pub id: Uuid,
    pub project_id: Uuid,
    pub version: String,
    pub meta: String,
    pub links: BTreeMap<String, String>,
    pub children: Vec<String>,
    pub latest_version: Option<VersionDescriptor>,
}

/// A document's published version history, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedVersions {
    pub id: Uuid,
    pub versions: Vec<VersionDescriptor>,
    pub latest_version: Option<String>,
}

/// One published link, queried by target.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedBacklinkView {
    pub source_id: Uuid,
    pub source_version: String,
    pub target_id: Uuid,
    pub target_version: String,
}

// ── Engine ───────────────────────────────────────────────────────────────

/// Publishing and published-namespace reads.
#[derive(Clone)]
pub struct PublishEngine {
    pool: DbPool,
    codec: Arc<dyn Codec>,
    cache: Arc<dyn Cache>,
    cache_ttl: Duration,
}

impl PublishEngine {
    pub fn new(
        pool: DbPool,
        codec: Arc<dyn Codec>,
        cache: Arc<dyn Cache>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            pool,
            codec,
            cache,
            cache_ttl,
        }
    }

    /// Publish one document.
    pub async fn publish(&self, req: PublishDocument) -> EngineResult<PublishedDocumentView> {
        let id = parse_uuid(&req.document_id, "document_id")?;
        let mut tx = self.pool.begin().await?;
        let view = self
            .publish_in_tx(&mut tx, id, req.version.as_deref(), req.force)
            .await?;
        tx.commit().await?;
        self.cache_published(&view).await;
        Ok(view)
    }

    /// Publish several documents in one transaction, in request order. Any
    /// failure rolls back the whole batch, so cross-linked documents publish
    /// consistently or not at all.
    pub async fn publish_many(
        &self,
        req: PublishDocuments,
    ) -> EngineResult<Vec<PublishedDocumentView>> {
        let mut ids = Vec::with_capacity(req.document_ids.len());
        for raw in &req.document_ids {
            ids.push(parse_uuid(raw, "document_ids")?);
        }

        let mut tx = self.pool.begin().await?;
        let mut views = Vec::with_capacity(ids.len());
        for id in ids {
            views.push(
                self.publish_in_tx(&mut tx, id, req.version.as_deref(), req.force)
                    .await?,
            );
        }
        tx.commit().await?;

        for view in &views {
            self.cache_published(view).await;
        }
        Ok(views)
    }

    /// Fetch a published document. `"latest"` or an empty version resolves
    /// through the latest projection; an explicit SemVer through the version
    /// line. Reads through the cache when one is configured.
    pub async fn get_published(
        &self,
        document_id: &str,
        version: &str,
    ) -> EngineResult<PublishedDocumentView> {
        let id = parse_uuid(document_id, "document_id")?;
        let resolved = if version.is_empty() { LATEST } else { version };

        let key = format!("{id}@{resolved}");
        if let Some(hit) = self.cache.get(&key).await {
            if let Ok(view) = serde_json::from_str::<PublishedDocumentView>(&hit) {
                return Ok(view);
            }
        }

        let view = if resolved == LATEST {
            let latest = PublishedDocumentRepo::find_latest(&self.pool, id)
                .await?
                .ok_or_else(|| CoreError::not_found("LatestPublishedDocument", document_id))?;
            self.view_from_latest(latest)?
        } else {
            version::parse(resolved)?;
            let doc = PublishedDocumentRepo::find_by_version(&self.pool, id, resolved)
                .await?
                .ok_or_else(|| {
                    CoreError::not_found("PublishedDocument", format!("{document_id}@{resolved}"))
                })?;
            let latest_meta = PublishedDocumentRepo::find_latest_meta(&self.pool, id).await?;
            self.view_from_published(doc, latest_meta.map(descriptor_from_latest_meta))?
        };

        if let Ok(serialized) = serde_json::to_string(&view) {
            self.cache.set(&key, &serialized, self.cache_ttl).await;
        }
        Ok(view)
    }

    /// Meta-only variant of [`get_published`](Self::get_published); never
    /// touches the cache.
    pub async fn get_published_meta(
        &self,
        document_id: &str,
        version: &str,
    ) -> EngineResult<PublishedDocumentMetaView> {
        let id = parse_uuid(document_id, "document_id")?;
        let resolved = if version.is_empty() { LATEST } else { version };

        if resolved == LATEST {
            let latest = PublishedDocumentRepo::find_latest_meta(&self.pool, id)
                .await?
                .ok_or_else(|| CoreError::not_found("LatestPublishedDocumentMeta", document_id))?;
            return self.meta_view_from_latest(latest);
        }

        version::parse(resolved)?;
        let meta = PublishedDocumentRepo::find_meta_by_version(&self.pool, id, resolved)
            .await?
            .ok_or_else(|| {
                CoreError::not_found("PublishedDocumentMeta", format!("{document_id}@{resolved}"))
            })?;
        let latest_meta = PublishedDocumentRepo::find_latest_meta(&self.pool, id).await?;
        self.meta_view_from_meta(meta, latest_meta.map(descriptor_from_latest_meta))
    }

    /// The latest-published projection of every document in a project.
    pub async fn list_latest_by_project(
        &self,
        project_id: &str,
    ) -> EngineResult<Vec<PublishedDocumentMetaView>> {
        let project_id = parse_uuid(project_id, "project_id")?;
        let rows = PublishedDocumentRepo::list_latest_by_project(&self.pool, project_id).await?;
        rows.into_iter()
            .map(|row| self.meta_view_from_latest(row))
            .collect()
    }

    /// Full published documents for an explicit `id@version` list.
    pub async fn list_published_by_id_versions(
        &self,
        project_id: &str,
        id_versions: &[(String, String)],
    ) -> EngineResult<Vec<PublishedDocumentView>> {
        let project_id = parse_uuid(project_id, "project_id")?;
        let mut pairs = Vec::with_capacity(id_versions.len());
        for (raw_id, raw_version) in id_versions {
            version::parse(raw_version)?;
            pairs.push(IdVersion {
                id: parse_uuid(raw_id, "id_versions")?,
                version: raw_version.clone(),
            });
        }
        let docs =
            PublishedDocumentRepo::list_by_id_versions(&self.pool, project_id, &pairs).await?;
        docs.into_iter()
            .map(|doc| self.view_from_published(doc, None))
            .collect()
    }

    /// A document's published version history, newest first, with the
    /// latest version summarized.
    pub async fn list_published_versions(
        &self,
        document_id: &str,
    ) -> EngineResult<PublishedVersions> {
        let id = parse_uuid(document_id, "document_id")?;
        let metas = PublishedDocumentRepo::list_versions(&self.pool, id).await?;
        let versions: Vec<VersionDescriptor> = metas
            .into_iter()
            .map(|m| VersionDescriptor {
                version: m.version,
                created_at: m.created_at,
            })
            .collect();

        let latest_version = if versions.is_empty() {
            None
        } else {
            PublishedDocumentRepo::find_latest_meta(&self.pool, id)
                .await?
                .map(|m| m.version)
        };

        Ok(PublishedVersions {
            id,
            versions,
            latest_version,
        })
    }

    /// All published links pointing at the given target id and version
    /// token.
    pub async fn list_published_backlinks(
        &self,
        document_id: &str,
        target_version: &str,
    ) -> EngineResult<Vec<PublishedBacklinkView>> {
        let target_id = parse_uuid(document_id, "document_id")?;
        let links =
            PublishedLinkRepo::list_backlinks(&self.pool, target_id, target_version).await?;
        Ok(links
            .into_iter()
            .map(|l| PublishedBacklinkView {
                source_id: l.source_id,
                source_version: l.source_version,
                target_id: l.target_id,
                target_version: l.target_version,
            })
            .collect())
    }

    /// Remove one published version; the latest projection repoints to the
    /// newest survivor. Cached entries for the document are invalidated.
    pub async fn unpublish(&self, document_id: &str, version: &str) -> EngineResult<Uuid> {
        let id = parse_uuid(document_id, "document_id")?;
        version::parse(version)?;

        let mut tx = self.pool.begin().await?;
        let removed = PublishedDocumentRepo::unpublish(&mut *tx, id, version).await?;
        if !removed {
            return Err(
                CoreError::not_found("PublishedDocument", format!("{document_id}@{version}"))
                    .into(),
            );
        }
        tx.commit().await?;

        self.cache.remove(&format!("{id}@{version}")).await;
        self.cache.remove(&format!("{id}@{LATEST}")).await;
        tracing::info!(document_id = %id, version, "unpublished document version");
        Ok(id)
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    /// One publish inside the caller's transaction: idempotence guard,
    /// version computation, the atomic store publish, and published-link
    /// materialization.
    async fn publish_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        version_override: Option<&str>,
        force: bool,
    ) -> EngineResult<PublishedDocumentView> {
        let doc = DocumentRepo::find_by_id(&mut **tx, id)
            .await?
            .ok_or_else(|| CoreError::not_found("Document", id.to_string()))?;

        let latest = PublishedDocumentRepo::find_latest(&mut **tx, id).await?;

        if let Some(latest) = &latest {
            let unchanged = latest.meta == doc.meta
                && latest.content == doc.content
                && latest.links == doc.links
                && latest.children == doc.children;
            if !force && unchanged {
                return Err(CoreError::AlreadyExists(format!(
                    "document {id} is already published at version {}",
                    latest.version
                ))
                .into());
            }
        }

        let next = version::next_published_version(
            latest.as_ref().map(|l| l.version.as_str()),
            version_override,
        )?;

        let input = NewPublishedDocument {
            id,
            project_id: doc.project_id,
            version: next.to_string(),
            meta: doc.meta.clone(),
            content: doc.content.clone(),
            links: doc.links.clone(),
            children: doc.children.clone(),
        };

        let published = PublishedDocumentRepo::publish(&mut **tx, &input)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    EngineError::Core(CoreError::AlreadyExists(format!(
                        "version {next} is already published for document {id}"
                    )))
                } else {
                    e.into()
                }
            })?;

        let links = decode_links(self.codec.as_ref(), &doc.links)?;
        let mut published_links = Vec::with_capacity(links.len());
        for key in links.keys() {
            let parsed = LinkKey::parse(key)?;
            published_links.push(NewPublishedLink {
                source_id: id,
                source_version: published.version.clone(),
                target_id: parsed.target_id,
                target_version: parsed.target_version,
            });
        }
        if !published_links.is_empty() {
            PublishedLinkRepo::upsert_many(&mut **tx, &published_links).await?;
        }

        tracing::info!(document_id = %id, version = %published.version, "published document");

        let descriptor = VersionDescriptor {
            version: published.version.clone(),
            created_at: published.created_at,
        };
        self.view_from_published(published, Some(descriptor))
    }

    /// Best-effort write-through after a committed publish: the view lands
    /// under both `"<id>@latest"` and `"<id>@<version>"`.
    async fn cache_published(&self, view: &PublishedDocumentView) {
        let serialized = match serde_json::to_string(view) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize published document for cache");
                return;
            }
        };
        let id = view.id;
        self.cache
            .set(&format!("{id}@{LATEST}"), &serialized, self.cache_ttl)
            .await;
        self.cache
            .set(&format!("{id}@{}", view.version), &serialized, self.cache_ttl)
            .await;
    }

    fn view_from_published(
        &self,
        doc: PublishedDocument,
        latest_version: Option<VersionDescriptor>,
    ) -> EngineResult<PublishedDocumentView> {
        let codec = self.codec.as_ref();
        Ok(PublishedDocumentView {
            id: doc.id,
            project_id: doc.project_id,
            version: doc.version,
            meta: decode_text(codec, &doc.meta)?,
            content: decode_text(codec, &doc.content)?,
            links: decode_links(codec, &doc.links)?,
            children: decode_children(codec, &doc.children)?,
            latest_version,
        })
    }

    fn view_from_latest(&self, row: LatestPublishedDocument) -> EngineResult<PublishedDocumentView> {
        let codec = self.codec.as_ref();
        let descriptor = VersionDescriptor {
            version: row.version.clone(),
            created_at: row.updated_at,
        };
        Ok(PublishedDocumentView {
            id: row.id,
            project_id: row.project_id,
            version: row.version,
            meta: decode_text(codec, &row.meta)?,
            content: decode_text(codec, &row.content)?,
            links: decode_links(codec, &row.links)?,
            children: decode_children(codec, &row.children)?,
            latest_version: Some(descriptor),
        })
    }

    fn meta_view_from_latest(
        &self,
        row: LatestPublishedDocumentMeta,
    ) -> EngineResult<PublishedDocumentMetaView> {
        let codec = self.codec.as_ref();
        let descriptor = VersionDescriptor {
            version: row.version.clone(),
            created_at: row.updated_at,
        };
        Ok(PublishedDocumentMetaView {
            id: row.id,
            project_id: row.project_id,
            version: row.version,
            meta: decode_text(codec, &row.meta)?,
            links: decode_links(codec, &row.links)?,
            children: decode_children(codec, &row.children)?,
            latest_version: Some(descriptor),
        })
    }

    fn meta_view_from_meta(
        &self,
        row: PublishedDocumentMeta,
        latest_version: Option<VersionDescriptor>,
    ) -> EngineResult<PublishedDocumentMetaView> {
        let codec = self.codec.as_ref();
        Ok(PublishedDocumentMetaView {
            id: row.id,
            project_id: row.project_id,
            version: row.version,
            meta: decode_text(codec, &row.meta)?,
            links: decode_links(codec, &row.links)?,
            children: decode_children(codec, &row.children)?,
            latest_version,
        })
    }
}

fn descriptor_from_latest_meta(meta: LatestPublishedDocumentMeta) -> VersionDescriptor {
    VersionDescriptor {
        version: meta.version,
        created_at: meta.updated_at,
    }
}
