//! Time-ordered catalog of stored backups

use crate::error::VaultError;
use crate::record::{BackupKind, BackupRecord};
use crate::store::BackupStore;
use chrono::NaiveDateTime;

/// Filter applied by `list`
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Keep records strictly after this time
    pub after: Option<NaiveDateTime>,
    /// Keep records strictly before this time
    pub before: Option<NaiveDateTime>,
    /// Keep only full backups
    pub full_only: bool,
}

impl ListFilter {
    pub fn matches(&self, record: &BackupRecord) -> bool {
        if self.full_only && record.kind != BackupKind::Full {
            return false;
        }
        if let Some(after) = self.after {
            if record.timestamp <= after {
                return false;
            }
        }
        if let Some(before) = self.before {
            if record.timestamp >= before {
                return false;
            }
        }
        true
    }
}

/// Backup records sorted by timestamp (oldest first)
///
/// Every consumer relies on this ordering; the records are never re-sorted
/// after construction.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<BackupRecord>,
}

impl Catalog {
    /// List the store under `prefix` and decode every artifact found there
    ///
    /// A listing failure propagates as `StorageUnavailable`; identifiers that
    /// are not backup names are skipped.
    pub async fn list(store: &dyn BackupStore, prefix: &str) -> Result<Self, VaultError> {
        let paths = store.list(prefix).await?;
        tracing::debug!(prefix, count = paths.len(), "listed backup artifacts");
        Ok(Self::from_paths(paths))
    }

    /// Build a catalog from raw identifiers without touching the store
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records = paths
            .into_iter()
            .filter_map(|path| {
                let path = path.into();
                match BackupRecord::from_path(path.clone()) {
                    Ok(record) => Some(record),
                    Err(error) => {
                        tracing::warn!(%path, %error, "skipping unrecognized artifact");
                        None
                    }
                }
            })
            .collect();
        Self::from_records(records)
    }

    /// Build a catalog from already-decoded records
    pub fn from_records(mut records: Vec<BackupRecord>) -> Self {
        // (timestamp, path) agrees with the lexical order of well-formed names
        records.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.path.cmp(&b.path))
        });
        records.dedup_by(|a, b| a.path == b.path);
        Self { records }
    }

    pub fn records(&self) -> &[BackupRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<BackupRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Full backups only, in order
    pub fn fulls(&self) -> impl Iterator<Item = &BackupRecord> {
        self.records.iter().filter(|r| r.is_full())
    }

    /// Most recent backup of any kind
    pub fn latest(&self) -> Option<&BackupRecord> {
        self.records.last()
    }

    /// Records matching `filter`, in order
    pub fn filter(&self, filter: &ListFilter) -> Vec<BackupRecord> {
        self.records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }
}
