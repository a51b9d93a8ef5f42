//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods over the
//! tables it owns. Single-statement methods accept any `PgExecutor` (pool or
//! open transaction); multi-statement methods take `&mut PgConnection` and
//! are meant to run inside a transaction owned by the calling engine.

pub mod document_backup_repo;
pub mod document_repo;
pub mod link_repo;
pub mod published_document_repo;
pub mod published_link_repo;

pub use document_backup_repo::DocumentBackupRepo;
pub use document_repo::DocumentRepo;
pub use link_repo::LinkRepo;
pub use published_document_repo::PublishedDocumentRepo;
pub use published_link_repo::PublishedLinkRepo;
