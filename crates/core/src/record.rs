//! Backup record data structures

use crate::error::NamingError;
use crate::naming;
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a stored backup artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BackupKind {
    /// Self-contained snapshot of the whole database
    Full,
    /// Changes since the previous backup in the chain
    Incremental,
}

impl BackupKind {
    pub fn is_full(self) -> bool {
        matches!(self, BackupKind::Full)
    }
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupKind::Full => f.write_str("Full"),
            BackupKind::Incremental => f.write_str("Incremental"),
        }
    }
}

/// A backup artifact as found in the store
///
/// Records are never mutated after the catalog decodes them; they disappear
/// only when a deletion plan is executed against the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Store identifier (unique, immutable)
    pub path: String,
    /// When the backup was taken (second resolution)
    pub timestamp: NaiveDateTime,
    /// Full or incremental
    pub kind: BackupKind,
}

impl BackupRecord {
    /// Decode a record from its store identifier
    pub fn from_path(path: impl Into<String>) -> Result<Self, NamingError> {
        let path = path.into();
        let (timestamp, kind) = naming::decode(&path)?;
        Ok(Self {
            path,
            timestamp,
            kind,
        })
    }

    /// Build a record for a new artifact under `prefix`
    ///
    /// Sub-second precision is dropped so the record matches its encoded name.
    pub fn new(prefix: &str, timestamp: NaiveDateTime, kind: BackupKind) -> Self {
        let timestamp = timestamp.with_nanosecond(0).unwrap_or(timestamp);
        Self {
            path: naming::encode(prefix, timestamp, kind),
            timestamp,
            kind,
        }
    }

    pub fn is_full(&self) -> bool {
        self.kind.is_full()
    }

    /// Timestamp rendered in the persisted naming format
    pub fn formatted_time(&self) -> String {
        naming::format_timestamp(self.timestamp)
    }
}
