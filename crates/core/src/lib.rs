//! mbvault core - backup catalog model for point-in-time database restores
//!
//! This crate provides the foundational catalog layer:
//! - Backup records and kinds (full / incremental)
//! - Bidirectional naming codec for stored artifacts
//! - Time-ordered catalog built from store listings
//! - Object store collaborator trait and `object_store` backend

pub mod catalog;
pub mod error;
pub mod naming;
pub mod record;
pub mod store;

// Re-export main types for convenience
pub use catalog::{Catalog, ListFilter};
pub use error::{NamingError, VaultError};
pub use naming::{TIMESTAMP_FORMAT, FULL_SUFFIX};
pub use record::{BackupKind, BackupRecord};
pub use store::{BackupStore, ObjectStoreBackend};

/// Common result type used throughout mbvault-core
pub type Result<T> = std::result::Result<T, VaultError>;
