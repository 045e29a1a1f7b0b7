//! Restore-chain resolution and retention planning
//!
//! This crate provides:
//! - Retention policy parsing (`7:days,4:weeks,12:months,5:years`)
//! - Point-in-time chain resolution over a time-ordered catalog
//! - Grandfather-father-son bucket selection for full backups
//! - Deletion planning that never breaks a retained restore point
//!
//! Everything here is pure and synchronous; storage I/O lives in `vault_core`.

pub mod chain;
pub mod gfs;
pub mod policy;
pub mod retention;

// Re-exports
pub use chain::resolve;
pub use gfs::{Bucket, Period};
pub use policy::{RetentionPolicy, DEFAULT_RETENTION};
pub use retention::{DeletionPlan, RetentionPlanner};

/// Result type for planner operations
pub type Result<T> = std::result::Result<T, vault_core::VaultError>;
