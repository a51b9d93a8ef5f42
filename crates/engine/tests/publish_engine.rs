//! Integration tests for the publish engine.
//!
//! Covers the version-line laws (initial 0.0.1, patch increments, override
//! rules), the idempotent-publish guard, atomic publish-many, the latest
//! projection, published backlinks, and cache write-through/invalidation.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use vellum_core::codec::NopCodec;
use vellum_engine::cache::{Cache, MemoryCache};
use vellum_engine::document::{UpdateDocument, UpdateKind};
use vellum_engine::publish::{PublishDocument, PublishDocuments};

use common::{create_request, document_engine, publish_engine, publish_engine_with};

fn publish_request(document_id: Uuid) -> PublishDocument {
    PublishDocument {
        document_id: document_id.to_string(),
        version: None,
        force: false,
    }
}

fn content_update(document_id: Uuid, version: i64, content: &str) -> UpdateDocument {
    UpdateDocument {
        document_id: document_id.to_string(),
        version,
        meta: None,
        content: Some(content.to_string()),
        links: None,
        children: None,
        kind: UpdateKind::Text,
    }
}

// ---------------------------------------------------------------------------
// Test: first publish yields 0.0.1
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_first_publish_is_initial_version(pool: PgPool) {
    let documents = document_engine(&pool);
    let publisher = publish_engine(&pool);
    let doc = documents
        .create(create_request(Uuid::new_v4(), "body"))
        .await
        .unwrap();

    let published = publisher.publish(publish_request(doc.id)).await.unwrap();
    assert_eq!(published.version, "0.0.1");
    assert_eq!(published.content, "body");

    let latest = publisher.get_published(&doc.id.to_string(), "latest").await.unwrap();
    assert_eq!(latest.version, "0.0.1");
    assert_eq!(latest.content, "body");
}

// ---------------------------------------------------------------------------
// Test: idempotence guard and history
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_republish_without_changes_conflicts(pool: PgPool) {
    let documents = document_engine(&pool);
    let publisher = publish_engine(&pool);
    let doc = documents
        .create(create_request(Uuid::new_v4(), "one"))
        .await
        .unwrap();

    publisher.publish(publish_request(doc.id)).await.unwrap();

    let err = publisher.publish(publish_request(doc.id)).await.unwrap_err();
    assert_eq!(err.code(), "ALREADY_EXISTS");
    assert!(err.to_string().contains("0.0.1"), "carries the existing version");

    // After a mutation the next publish advances the patch version, and the
    // first snapshot remains readable.
    documents.update(content_update(doc.id, 1, "two")).await.unwrap();
    let second = publisher.publish(publish_request(doc.id)).await.unwrap();
    assert_eq!(second.version, "0.0.2");

    let latest = publisher.get_published(&doc.id.to_string(), "latest").await.unwrap();
    assert_eq!(latest.version, "0.0.2");
    assert_eq!(latest.content, "two");

    let first = publisher.get_published(&doc.id.to_string(), "0.0.1").await.unwrap();
    assert_eq!(first.content, "one");
    let descriptor = first.latest_version.expect("explicit reads carry the latest summary");
    assert_eq!(descriptor.version, "0.0.2");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_force_republishes_unchanged_document(pool: PgPool) {
    let documents = document_engine(&pool);
    let publisher = publish_engine(&pool);
    let doc = documents
        .create(create_request(Uuid::new_v4(), "same"))
        .await
        .unwrap();

    publisher.publish(publish_request(doc.id)).await.unwrap();
    let forced = publisher
        .publish(PublishDocument {
            document_id: doc.id.to_string(),
            version: None,
            force: true,
        })
        .await
        .unwrap();
    assert_eq!(forced.version, "0.0.2");
}

// ---------------------------------------------------------------------------
// Test: version override rules
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_version_override_rules(pool: PgPool) {
    let documents = document_engine(&pool);
    let publisher = publish_engine(&pool);
    let doc = documents
        .create(create_request(Uuid::new_v4(), "one"))
        .await
        .unwrap();

    // First publish may pick any SemVer.
    let published = publisher
        .publish(PublishDocument {
            document_id: doc.id.to_string(),
            version: Some("1.0.0".to_string()),
            force: false,
        })
        .await
        .unwrap();
    assert_eq!(published.version, "1.0.0");

    documents.update(content_update(doc.id, 1, "two")).await.unwrap();

    // An override at or below the published version is rejected.
    for bad in ["1.0.0", "0.9.9"] {
        let err = publisher
            .publish(PublishDocument {
                document_id: doc.id.to_string(),
                version: Some(bad.to_string()),
                force: false,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FAILED_PRECONDITION", "override {bad} must fail");
    }

    // Malformed SemVer is an invalid argument.
    let err = publisher
        .publish(PublishDocument {
            document_id: doc.id.to_string(),
            version: Some("not-semver".to_string()),
            force: false,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_ARGUMENT");

    // A strictly greater override wins over the patch-increment candidate.
    let published = publisher
        .publish(PublishDocument {
            document_id: doc.id.to_string(),
            version: Some("2.0.0".to_string()),
            force: false,
        })
        .await
        .unwrap();
    assert_eq!(published.version, "2.0.0");
}

// ---------------------------------------------------------------------------
// Test: published backlinks
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_publish_materializes_links(pool: PgPool) {
    let documents = document_engine(&pool);
    let publisher = publish_engine(&pool);
    let project_id = Uuid::new_v4();
    let a = documents.create(create_request(project_id, "a")).await.unwrap();
    let b = documents.create(create_request(project_id, "b")).await.unwrap();

    let links = BTreeMap::from([(format!("{}@current", b.id), "b".to_string())]);
    documents
        .update(UpdateDocument {
            document_id: a.id.to_string(),
            version: 1,
            meta: None,
            content: None,
            links: Some(links),
            children: None,
            kind: UpdateKind::Text,
        })
        .await
        .unwrap();

    let published = publisher.publish(publish_request(a.id)).await.unwrap();
    assert_eq!(published.version, "0.0.1");

    let backlinks = publisher
        .list_published_backlinks(&b.id.to_string(), "current")
        .await
        .unwrap();
    assert_eq!(backlinks.len(), 1);
    assert_eq!(backlinks[0].source_id, a.id);
    assert_eq!(backlinks[0].source_version, "0.0.1");
    assert_eq!(
        backlinks[0].target_version, "current",
        "the sentinel flows through publish unresolved"
    );
}

// ---------------------------------------------------------------------------
// Test: publish-many is atomic
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_publish_many_commits_together(pool: PgPool) {
    let documents = document_engine(&pool);
    let publisher = publish_engine(&pool);
    let project_id = Uuid::new_v4();
    let a = documents.create(create_request(project_id, "a")).await.unwrap();
    let b = documents.create(create_request(project_id, "b")).await.unwrap();

    let views = publisher
        .publish_many(PublishDocuments {
            document_ids: vec![a.id.to_string(), b.id.to_string()],
            version: None,
            force: false,
        })
        .await
        .unwrap();
    assert_eq!(views.len(), 2);
    assert!(views.iter().all(|v| v.version == "0.0.1"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_publish_many_rolls_back_on_failure(pool: PgPool) {
    let documents = document_engine(&pool);
    let publisher = publish_engine(&pool);
    let a = documents
        .create(create_request(Uuid::new_v4(), "a"))
        .await
        .unwrap();

    let err = publisher
        .publish_many(PublishDocuments {
            document_ids: vec![a.id.to_string(), Uuid::new_v4().to_string()],
            version: None,
            force: false,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");

    // The successful half of the batch must not be visible.
    let err = publisher
        .get_published(&a.id.to_string(), "latest")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Test: published reads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_get_published_not_found_and_empty_version(pool: PgPool) {
    let documents = document_engine(&pool);
    let publisher = publish_engine(&pool);
    let doc = documents
        .create(create_request(Uuid::new_v4(), "x"))
        .await
        .unwrap();

    let err = publisher
        .get_published(&doc.id.to_string(), "latest")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND", "nothing published yet");

    publisher.publish(publish_request(doc.id)).await.unwrap();

    // An empty version resolves like "latest".
    let view = publisher.get_published(&doc.id.to_string(), "").await.unwrap();
    assert_eq!(view.version, "0.0.1");

    let err = publisher
        .get_published(&doc.id.to_string(), "9.9.9")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_get_published_meta_and_listings(pool: PgPool) {
    let documents = document_engine(&pool);
    let publisher = publish_engine(&pool);
    let project_id = Uuid::new_v4();

    let mut req = create_request(project_id, "body");
    req.meta = r#"{"title":"a"}"#.to_string();
    let doc = documents.create(req).await.unwrap();

    publisher.publish(publish_request(doc.id)).await.unwrap();
    documents.update(content_update(doc.id, 1, "body2")).await.unwrap();
    publisher.publish(publish_request(doc.id)).await.unwrap();

    let meta = publisher
        .get_published_meta(&doc.id.to_string(), "latest")
        .await
        .unwrap();
    assert_eq!(meta.version, "0.0.2");
    assert_eq!(meta.meta, r#"{"title":"a"}"#);

    let meta = publisher
        .get_published_meta(&doc.id.to_string(), "0.0.1")
        .await
        .unwrap();
    assert_eq!(meta.version, "0.0.1");

    let latest = publisher
        .list_latest_by_project(&project_id.to_string())
        .await
        .unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].version, "0.0.2");

    let versions = publisher
        .list_published_versions(&doc.id.to_string())
        .await
        .unwrap();
    let order: Vec<&str> = versions.versions.iter().map(|v| v.version.as_str()).collect();
    assert_eq!(order, ["0.0.2", "0.0.1"]);
    assert_eq!(versions.latest_version.as_deref(), Some("0.0.2"));

    let docs = publisher
        .list_published_by_id_versions(
            &project_id.to_string(),
            &[(doc.id.to_string(), "0.0.1".to_string())],
        )
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].content, "body");
}

// ---------------------------------------------------------------------------
// Test: cache write-through and invalidation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_publish_writes_through_cache(pool: PgPool) {
    let documents = document_engine(&pool);
    let cache = Arc::new(MemoryCache::new());
    let publisher = publish_engine_with(&pool, Arc::new(NopCodec), cache.clone());
    let doc = documents
        .create(create_request(Uuid::new_v4(), "cached"))
        .await
        .unwrap();

    let published = publisher.publish(publish_request(doc.id)).await.unwrap();

    let latest_key = format!("{}@latest", doc.id);
    let version_key = format!("{}@{}", doc.id, published.version);
    assert!(cache.get(&latest_key).await.is_some(), "latest key is written through");
    assert!(cache.get(&version_key).await.is_some(), "version key is written through");

    // The cached latest serves reads and matches the store's answer.
    let view = publisher.get_published(&doc.id.to_string(), "latest").await.unwrap();
    assert_eq!(view.version, "0.0.1");
    assert_eq!(view.content, "cached");

    // Unpublish drops both keys.
    publisher.unpublish(&doc.id.to_string(), "0.0.1").await.unwrap();
    assert!(cache.get(&latest_key).await.is_none());
    assert!(cache.get(&version_key).await.is_none());
}

// ---------------------------------------------------------------------------
// Test: unpublish
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unpublish_repoints_latest(pool: PgPool) {
    let documents = document_engine(&pool);
    let publisher = publish_engine(&pool);
    let doc = documents
        .create(create_request(Uuid::new_v4(), "one"))
        .await
        .unwrap();

    publisher.publish(publish_request(doc.id)).await.unwrap();
    documents.update(content_update(doc.id, 1, "two")).await.unwrap();
    publisher.publish(publish_request(doc.id)).await.unwrap();

    publisher.unpublish(&doc.id.to_string(), "0.0.2").await.unwrap();

    let latest = publisher.get_published(&doc.id.to_string(), "latest").await.unwrap();
    assert_eq!(latest.version, "0.0.1");
    assert_eq!(latest.content, "one");

    let err = publisher
        .unpublish(&doc.id.to_string(), "3.0.0")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}
