// All functions in this module are shared test helpers. Not every test
// binary uses every helper, so we suppress dead_code warnings at the module
// level.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use vellum_core::codec::{Codec, NopCodec};
use vellum_engine::backup::BackupEngine;
use vellum_engine::cache::{Cache, NoopCache};
use vellum_engine::document::{CreateDocument, DocumentEngine};
use vellum_engine::publish::PublishEngine;

pub const CACHE_TTL: Duration = Duration::from_secs(300);

/// Document engine over the pass-through codec.
pub fn document_engine(pool: &PgPool) -> DocumentEngine {
    document_engine_with(pool, Arc::new(NopCodec))
}

/// Document engine over an explicit codec.
pub fn document_engine_with(pool: &PgPool, codec: Arc<dyn Codec>) -> DocumentEngine {
    DocumentEngine::new(pool.clone(), codec)
}

/// Publish engine with no cache.
pub fn publish_engine(pool: &PgPool) -> PublishEngine {
    publish_engine_with(pool, Arc::new(NopCodec), Arc::new(NoopCache))
}

/// Publish engine over an explicit codec and cache.
pub fn publish_engine_with(
    pool: &PgPool,
    codec: Arc<dyn Codec>,
    cache: Arc<dyn Cache>,
) -> PublishEngine {
    PublishEngine::new(pool.clone(), codec, cache, CACHE_TTL)
}

/// Backup engine over the pass-through codec.
pub fn backup_engine(pool: &PgPool) -> BackupEngine {
    backup_engine_with(pool, Arc::new(NopCodec))
}

/// Backup engine over an explicit codec.
pub fn backup_engine_with(pool: &PgPool, codec: Arc<dyn Codec>) -> BackupEngine {
    BackupEngine::new(pool.clone(), codec)
}

/// A minimal create request: empty JSON meta, given content, no links.
pub fn create_request(project_id: Uuid, content: &str) -> CreateDocument {
    CreateDocument {
        project_id: project_id.to_string(),
        document_id: None,
        meta: "{}".to_string(),
        content: content.to_string(),
        links: None,
        children: None,
        kind: None,
    }
}
