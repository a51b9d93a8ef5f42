//! Engines over the store.
//!
//! Exposes the service surface of the versioned document core: the document
//! engine (create / read / version-checked update / delete), the publish
//! engine (SemVer version line plus latest projection), the backup engine
//! (history queries and restore), the backup retention worker, and the
//! advisory cache adapter. A transport layer (gRPC/REST) is an external
//! collaborator that maps these methods and their error codes.

pub mod background;
pub mod backup;
pub mod cache;
pub mod config;
pub mod document;
pub mod error;
mod payload;
pub mod publish;
