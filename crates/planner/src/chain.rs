//! Point-in-time restore chain resolution

use crate::Result;
use chrono::NaiveDateTime;
use vault_core::{BackupRecord, VaultError};

/// Backups to apply, in order, to rebuild the database as of `target`
///
/// `records` must be in catalog order (oldest first). The result starts with
/// the latest full backup at or before `target`, followed by every
/// incremental between it and `target`. Fails with `InvalidChain` when no
/// full backup precedes `target`, rather than returning incrementals that
/// cannot be applied.
pub fn resolve(records: &[BackupRecord], target: NaiveDateTime) -> Result<Vec<BackupRecord>> {
    debug_assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let mut chain: Vec<BackupRecord> = Vec::new();
    for record in records.iter().filter(|r| r.timestamp <= target) {
        if record.is_full() {
            chain.clear();
        }
        chain.push(record.clone());
    }

    match chain.first() {
        Some(base) if base.is_full() => {
            tracing::debug!(
                target = %target,
                base = %base.path,
                length = chain.len(),
                "resolved restore chain"
            );
            Ok(chain)
        }
        _ => Err(VaultError::InvalidChain { target }),
    }
}
