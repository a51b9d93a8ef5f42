//! Document engine: the mutable-draft side of the service.
//!
//! Every mutation runs inside one store transaction. The update path is the
//! load-bearing operation: optimistic version check, pre-update
//! snapshotting, no-change guard, and link reconciliation all commit or
//! roll back together.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use vellum_core::codec::Codec;
use vellum_core::error::CoreError;
use vellum_core::link::LinkKey;
use vellum_core::patch::apply_json_patch;
use vellum_core::types::Timestamp;

use vellum_db::models::document::{Document, NewDocument};
use vellum_db::models::document_backup::NewDocumentBackup;
use vellum_db::models::link::NewLink;
use vellum_db::models::published_document::IdVersion;
use vellum_db::repositories::{
    DocumentBackupRepo, DocumentRepo, LinkRepo, PublishedDocumentRepo,
};
use vellum_db::DbPool;

use crate::error::{parse_uuid, EngineError, EngineResult};
use crate::payload::{
    decode_children, decode_links, decode_text, encode_children, encode_links, encode_text,
};

/// Version sentinel requesting an overwrite update (no optimistic check).
pub const OVERWRITE_VERSION: i64 = -1;

/// Default page size for project listings.
const DEFAULT_PAGE_SIZE: i64 = 100;

/// Upper bound on a requested page size.
const MAX_PAGE_SIZE: i64 = 1000;

/// How an update interprets the `meta` and `content` fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateKind {
    /// Fields replace the stored payload.
    #[default]
    #[serde(rename = "TEXT")]
    Text,
    /// Fields are RFC 6902 patches applied to the stored payload. Only
    /// valid with a matching version, never with overwrite.
    #[serde(rename = "JSONPATCH")]
    JsonPatch,
}

impl FromStr for UpdateKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TEXT" => Ok(UpdateKind::Text),
            "JSONPATCH" => Ok(UpdateKind::JsonPatch),
            other => Err(CoreError::InvalidArgument(format!(
                "unknown update kind {other:?}"
            ))),
        }
    }
}

// ── Requests ─────────────────────────────────────────────────────────────

/// Request to create a working document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateDocument {
    pub project_id: String,
    /// Client-chosen document ID; generated when absent.
    pub document_id: Option<String>,
    pub meta: String,
    pub content: String,
    pub links: Option<BTreeMap<String, String>>,
    pub children: Option<Vec<String>>,
    pub kind: Option<String>,
}

/// Request to update a working document.
///
/// `version` is the optimistic clock: the stored version plus one, or
/// [`OVERWRITE_VERSION`] to bypass the check.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDocument {
    pub document_id: String,
    pub version: i64,
    pub meta: Option<String>,
    pub content: Option<String>,
    pub links: Option<BTreeMap<String, String>>,
    pub children: Option<Vec<String>>,
    pub kind: UpdateKind,
}

/// Request to list documents: by explicit IDs when given, otherwise by
/// project, paged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListDocuments {
    pub project_id: String,
    pub document_ids: Vec<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ── Responses ────────────────────────────────────────────────────────────

/// A fully decoded working document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentView {
    pub id: Uuid,
    pub project_id: Uuid,
    pub version: i64,
    pub meta: String,
    pub content: String,
    pub links: BTreeMap<String, String>,
    pub children: Vec<String>,
    pub kind: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Metadata-only listing projection (no content).
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub id: Uuid,
    pub project_id: Uuid,
    pub version: i64,
    pub meta: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Result of an update: the document and its new version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    pub id: Uuid,
    pub version: i64,
}

/// One entry in a document's version history.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentVersionEntry {
    pub version: i64,
    pub created_at: Timestamp,
}

/// A document's integer version history: the current head plus every
/// backup, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentVersions {
    pub id: Uuid,
    pub versions: Vec<DocumentVersionEntry>,
    pub latest_version: i64,
    pub created_at: Timestamp,
}

/// One stored outgoing link, queried by target.
#[derive(Debug, Clone, Serialize)]
pub struct BacklinkView {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub target_version: String,
}

// ── Engine ───────────────────────────────────────────────────────────────

/// Create / read / update / delete for working documents.
#[derive(Clone)]
pub struct DocumentEngine {
    pool: DbPool,
    codec: Arc<dyn Codec>,
}

impl DocumentEngine {
    pub fn new(pool: DbPool, codec: Arc<dyn Codec>) -> Self {
        Self { pool, codec }
    }

    /// Create a working document at version 0.
    pub async fn create(&self, req: CreateDocument) -> EngineResult<DocumentView> {
        let project_id = parse_uuid(&req.project_id, "project_id")?;
        let id = match &req.document_id {
            Some(raw) => parse_uuid(raw, "document_id")?,
            None => Uuid::new_v4(),
        };

        let links = req.links.unwrap_or_default();
        for key in links.keys() {
            LinkKey::parse(key)?;
        }
        let children = req.children.unwrap_or_default();

        let codec = self.codec.as_ref();
        let input = NewDocument {
            id,
            project_id,
            meta: encode_text(codec, &req.meta)?,
            content: encode_text(codec, &req.content)?,
            links: encode_links(codec, &links)?,
            children: encode_children(codec, &children)?,
            kind: req.kind.unwrap_or_else(|| "text".to_string()),
            compression: codec.name().to_string(),
        };

        let doc = DocumentRepo::create(&self.pool, &input).await.map_err(|e| {
            if crate::error::is_unique_violation(&e) {
                EngineError::Core(CoreError::AlreadyExists(format!(
                    "document {id} already exists"
                )))
            } else {
                e.into()
            }
        })?;

        tracing::info!(document_id = %doc.id, project_id = %doc.project_id, "created document");
        self.view(doc)
    }

    /// Fetch a working document with decoded payload.
    pub async fn get(&self, document_id: &str) -> EngineResult<DocumentView> {
        let id = parse_uuid(document_id, "document_id")?;
        let doc = DocumentRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| CoreError::not_found("Document", document_id))?;
        self.view(doc)
    }

    /// List documents: by explicit IDs (metadata projection, total = match
    /// count) or by project (paged, newest first, with the project total).
    pub async fn list(&self, req: ListDocuments) -> EngineResult<(Vec<DocumentInfo>, i64)> {
        if !req.document_ids.is_empty() {
            let mut ids = Vec::with_capacity(req.document_ids.len());
            for raw in &req.document_ids {
                ids.push(parse_uuid(raw, "document_ids")?);
            }
            let docs = DocumentRepo::list_by_ids(&self.pool, &ids).await?;
            let total = docs.len() as i64;
            let infos = docs
                .into_iter()
                .map(|d| self.info(d))
                .collect::<EngineResult<Vec<_>>>()?;
            return Ok((infos, total));
        }

        let project_id = parse_uuid(&req.project_id, "project_id")?;
        let limit = req.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = req.offset.unwrap_or(0).max(0);

        let docs = DocumentRepo::list_by_project(&self.pool, project_id, limit, offset).await?;
        let total = DocumentRepo::count_by_project(&self.pool, project_id).await?;
        let infos = docs
            .into_iter()
            .map(|d| self.info(d))
            .collect::<EngineResult<Vec<_>>>()?;
        Ok((infos, total))
    }

    /// Version-checked update.
    ///
    /// In one transaction: load the document, verify the requested version
    /// (or the overwrite sentinel), apply field changes, bump the version
    /// with a version-conditioned write, snapshot the pre-update payload
    /// (except for patch updates), and reconcile outgoing links. A payload
    /// identical to the stored one aborts with `NO_CHANGE`.
    pub async fn update(&self, req: UpdateDocument) -> EngineResult<UpdateOutcome> {
        let id = parse_uuid(&req.document_id, "document_id")?;
        let overwrite = req.version == OVERWRITE_VERSION;

        if overwrite && req.kind == UpdateKind::JsonPatch {
            return Err(CoreError::InvalidArgument(
                "a patch update cannot overwrite; request the next version".into(),
            )
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let doc = DocumentRepo::find_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| CoreError::not_found("Document", &req.document_id))?;

        let version_match = req.version == doc.version + 1;
        if !overwrite && !version_match {
            return Err(CoreError::FailedPrecondition(format!(
                "version mismatch for document {id}: current version {}, expected version {}, provided version {}",
                doc.version,
                doc.version + 1,
                req.version,
            ))
            .into());
        }

        let codec = self.codec.as_ref();
        let mut payload = doc.payload();

        match req.kind {
            UpdateKind::Text => {
                if let Some(meta) = &req.meta {
                    payload.meta = encode_text(codec, meta)?;
                }
                if let Some(content) = &req.content {
                    payload.content = encode_text(codec, content)?;
                }
            }
            UpdateKind::JsonPatch => {
                if let Some(patch) = &req.meta {
                    let current = codec.decode(&doc.meta)?;
                    payload.meta = codec.encode(&apply_json_patch(&current, patch.as_bytes())?)?;
                }
                if let Some(patch) = &req.content {
                    let current = codec.decode(&doc.content)?;
                    payload.content =
                        codec.encode(&apply_json_patch(&current, patch.as_bytes())?)?;
                }
            }
        }

        if let Some(links) = &req.links {
            payload.links = encode_links(codec, links)?;
        }
        if let Some(children) = &req.children {
            payload.children = encode_children(codec, children)?;
        }

        if payload.matches(&doc) {
            return Err(CoreError::NotChanged.into());
        }

        // The conditioned write goes first: it takes the row lock, so a
        // concurrent writer on the same version fails here rather than on
        // the backup key. The snapshot lands in the same transaction.
        let new_version = doc.version + 1;
        let written =
            DocumentRepo::update_payload(&mut *tx, id, doc.version, &payload, new_version).await?;
        if !written {
            return Err(CoreError::FailedPrecondition(format!(
                "document {id} was updated concurrently; re-read and retry"
            ))
            .into());
        }

        if req.kind != UpdateKind::JsonPatch {
            DocumentBackupRepo::create(&mut *tx, &NewDocumentBackup::of(&doc)).await?;
        }

        if payload.links != doc.links {
            let old_links = decode_links(codec, &doc.links)?;
            let new_links = req.links.clone().unwrap_or_default();
            reconcile_links(&mut tx, id, &old_links, &new_links).await?;
        }

        tx.commit().await?;

        tracing::info!(document_id = %id, version = new_version, "updated document");
        Ok(UpdateOutcome {
            id,
            version: new_version,
        })
    }

    /// Soft-delete a document. Returns the tombstoned id.
    pub async fn delete(&self, document_id: &str) -> EngineResult<Uuid> {
        let id = parse_uuid(document_id, "document_id")?;
        let deleted = DocumentRepo::soft_delete(&self.pool, id).await?;
        if !deleted {
            return Err(CoreError::not_found("Document", document_id).into());
        }
        tracing::info!(document_id = %id, "soft-deleted document");
        Ok(id)
    }

    /// Hard-delete a document and purge its backups and outgoing links.
    pub async fn erase(&self, document_id: &str) -> EngineResult<Uuid> {
        let id = parse_uuid(document_id, "document_id")?;
        let mut tx = self.pool.begin().await?;

        let removed = DocumentRepo::hard_delete(&mut *tx, id).await?;
        if !removed {
            return Err(CoreError::not_found("Document", document_id).into());
        }
        DocumentBackupRepo::delete_by_document(&mut *tx, id).await?;
        LinkRepo::delete_by_source(&mut *tx, id).await?;

        tx.commit().await?;
        tracing::info!(document_id = %id, "erased document");
        Ok(id)
    }

    /// All draft links pointing at the given document.
    pub async fn list_backlinks(&self, document_id: &str) -> EngineResult<Vec<BacklinkView>> {
        let target_id = parse_uuid(document_id, "document_id")?;
        let links = LinkRepo::list_backlinks(&self.pool, target_id).await?;
        Ok(links
            .into_iter()
            .map(|l| BacklinkView {
                source_id: l.source_id,
                target_id: l.target_id,
                target_version: l.target_version,
            })
            .collect())
    }

    /// The document's integer version history: the current head plus every
    /// backup version, newest first.
    pub async fn list_versions(&self, document_id: &str) -> EngineResult<DocumentVersions> {
        let id = parse_uuid(document_id, "document_id")?;
        let doc = DocumentRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| CoreError::not_found("Document", document_id))?;

        let mut versions = vec![DocumentVersionEntry {
            version: doc.version,
            created_at: doc.updated_at,
        }];
        for (version, created_at) in DocumentBackupRepo::list_versions(&self.pool, id).await? {
            versions.push(DocumentVersionEntry {
                version,
                created_at,
            });
        }

        Ok(DocumentVersions {
            id,
            versions,
            latest_version: doc.version,
            created_at: doc.created_at,
        })
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn view(&self, doc: Document) -> EngineResult<DocumentView> {
        let codec = self.codec.as_ref();
        Ok(DocumentView {
            id: doc.id,
            project_id: doc.project_id,
            version: doc.version,
            meta: decode_text(codec, &doc.meta)?,
            content: decode_text(codec, &doc.content)?,
            links: decode_links(codec, &doc.links)?,
            children: decode_children(codec, &doc.children)?,
            kind: doc.kind,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        })
    }

    fn info(&self, doc: Document) -> EngineResult<DocumentInfo> {
        Ok(DocumentInfo {
            id: doc.id,
            project_id: doc.project_id,
            version: doc.version,
            meta: decode_text(self.codec.as_ref(), &doc.meta)?,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        })
    }
}

/// Reconcile the link table against a changed link mapping.
///
/// Broken keys (in old, not in new) are deleted; added keys (in new, not in
/// old) are validated and inserted. A `"current"` target must exist as a
/// live working document; a SemVer target must exist at that published
/// version. Both must resolve to a project. Checks run before any write so
/// a failure aborts the caller's whole transaction.
async fn reconcile_links(
    tx: &mut Transaction<'_, Postgres>,
    source_id: Uuid,
    old_links: &BTreeMap<String, String>,
    new_links: &BTreeMap<String, String>,
) -> EngineResult<()> {
    let mut old_keys = BTreeMap::new();
    for key in old_links.keys() {
        old_keys.insert(key.clone(), LinkKey::parse(key)?);
    }
    let mut new_keys = BTreeMap::new();
    for key in new_links.keys() {
        new_keys.insert(key.clone(), LinkKey::parse(key)?);
    }

    let broken: Vec<&LinkKey> = old_keys
        .iter()
        .filter(|(key, _)| !new_keys.contains_key(*key))
        .map(|(_, parsed)| parsed)
        .collect();
    let added: Vec<&LinkKey> = new_keys
        .iter()
        .filter(|(key, _)| !old_keys.contains_key(*key))
        .map(|(_, parsed)| parsed)
        .collect();

    let current_targets: Vec<Uuid> = added
        .iter()
        .filter(|k| k.is_current())
        .map(|k| k.target_id)
        .collect();
    let published_targets: Vec<IdVersion> = added
        .iter()
        .filter(|k| !k.is_current())
        .map(|k| IdVersion {
            id: k.target_id,
            version: k.target_version.clone(),
        })
        .collect();

    if !current_targets.is_empty() {
        if !DocumentRepo::exists_all(&mut **tx, &current_targets).await? {
            return Err(CoreError::FailedPrecondition(format!(
                "link targets must exist as working documents: {current_targets:?}"
            ))
            .into());
        }
        let projects = DocumentRepo::project_ids_for(&mut **tx, &current_targets).await?;
        for target in &current_targets {
            if !projects.contains_key(target) {
                return Err(CoreError::FailedPrecondition(format!(
                    "link target {target} has no resolvable project"
                ))
                .into());
            }
        }
    }

    if !published_targets.is_empty() {
        if !PublishedDocumentRepo::exists_published_all(&mut **tx, &published_targets).await? {
            let labels: Vec<String> = published_targets
                .iter()
                .map(|p| format!("{}@{}", p.id, p.version))
                .collect();
            return Err(CoreError::FailedPrecondition(format!(
                "link targets must exist as published versions: {labels:?}"
            ))
            .into());
        }
        let ids: Vec<Uuid> = published_targets.iter().map(|p| p.id).collect();
        let projects = PublishedDocumentRepo::project_ids_for(&mut **tx, &ids).await?;
        for target in &ids {
            if !projects.contains_key(target) {
                return Err(CoreError::FailedPrecondition(format!(
                    "link target {target} has no resolvable project"
                ))
                .into());
            }
        }
    }

    let broken_rows: Vec<NewLink> = broken
        .iter()
        .map(|k| NewLink {
            source_id,
            target_id: k.target_id,
            target_version: k.target_version.clone(),
        })
        .collect();
    let added_rows: Vec<NewLink> = added
        .iter()
        .map(|k| NewLink {
            source_id,
            target_id: k.target_id,
            target_version: k.target_version.clone(),
        })
        .collect();

    if !broken_rows.is_empty() {
        LinkRepo::delete_many(&mut **tx, &broken_rows).await?;
    }
    if !added_rows.is_empty() {
        LinkRepo::upsert_many(&mut **tx, &added_rows).await?;
    }
    Ok(())
}
