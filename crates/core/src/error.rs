//! Error taxonomy shared by the catalog, planner and workflows

use chrono::NaiveDateTime;
use thiserror::Error;

/// Failure to map between an artifact identifier and its decoded form
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    /// Identifier has no usable name segment
    #[error("empty backup identifier: {0:?}")]
    Empty(String),

    /// Name segment does not carry a `YYYY-MM-DD HH:mm:ss` timestamp
    #[error("invalid backup timestamp {value:?} (expected format \"YYYY-MM-DD HH:mm:ss\")")]
    InvalidTimestamp { value: String },
}

/// Errors surfaced at the create/restore/prune/list boundary
#[derive(Debug, Error)]
pub enum VaultError {
    /// Listing, fetch, push or remove failed at the transport level
    #[error("storage unavailable during {op} of {path:?}: {message}")]
    StorageUnavailable {
        op: &'static str,
        path: String,
        message: String,
    },

    /// No full backup exists at or before the requested restore time
    #[error("no full backup at or before {target}; cannot build a restorable chain")]
    InvalidChain { target: NaiveDateTime },

    /// Retention spec produced a policy that would retain nothing beyond "now"
    #[error("unusable retention spec {spec:?}: {reason}")]
    MalformedPolicySpec { spec: String, reason: String },

    /// Some paths of a deletion set could not be removed
    #[error("failed to remove {} of {} backups: {}", .failed.len(), .failed.len() + .removed, .failed.join(", "))]
    PartialDeletionFailure { failed: Vec<String>, removed: usize },

    #[error(transparent)]
    Naming(#[from] NamingError),
}

impl VaultError {
    /// Build a `StorageUnavailable` from any displayable transport error
    pub fn storage(op: &'static str, path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::StorageUnavailable {
            op,
            path: path.into(),
            message: err.to_string(),
        }
    }
}
