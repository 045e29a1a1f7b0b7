//! Retention planning
//!
//! Planning runs in three phases over a time-ordered catalog:
//! 1. Orphan incrementals whose chain ends before the hot window
//! 2. Rotate full backups older than the hot window through GFS buckets
//! 3. Keep the base full of every chain that survives phase 1

use crate::gfs;
use crate::policy::RetentionPolicy;
use chrono::NaiveDateTime;
use std::collections::BTreeSet;
use vault_core::BackupRecord;

/// Paths scheduled for deletion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    /// Full backups rotated out by GFS
    pub fulls: BTreeSet<String>,
    /// Incrementals whose chain no longer reaches the hot window
    pub incrementals: BTreeSet<String>,
    /// Number of catalog records that survive
    pub retained: usize,
}

impl DeletionPlan {
    /// Every path to delete
    pub fn paths(&self) -> BTreeSet<String> {
        self.fulls.union(&self.incrementals).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.fulls.len() + self.incrementals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fulls.is_empty() && self.incrementals.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.fulls.contains(path) || self.incrementals.contains(path)
    }

    pub fn log_summary(&self) {
        tracing::info!(
            fulls = self.fulls.len(),
            incrementals = self.incrementals.len(),
            retained = self.retained,
            "retention plan computed"
        );
    }
}

/// Computes which backups may be deleted under a retention policy
pub struct RetentionPlanner {
    policy: RetentionPolicy,
}

impl RetentionPlanner {
    /// Create a new planner with the given policy
    pub fn new(policy: RetentionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Backups strictly newer than this are in the hot window
    pub fn hot_boundary(&self, now: NaiveDateTime) -> NaiveDateTime {
        now.checked_sub_signed(self.policy.hot_window())
            .unwrap_or(NaiveDateTime::MIN)
    }

    /// Plan deletions for `records` (catalog order) as of `now`
    ///
    /// Nothing inside the hot window is ever deleted, and every backup that
    /// survives remains restorable: its full base and all intermediate
    /// incrementals survive with it.
    pub fn plan(&self, records: &[BackupRecord], now: NaiveDateTime) -> DeletionPlan {
        debug_assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        let boundary = self.hot_boundary(now);

        // Phase 1: orphaned incrementals
        let (incrementals, anchored) = orphaned_incrementals(records, boundary);

        // Phase 2: GFS rotation of old fulls
        let old_fulls: Vec<&BackupRecord> = records
            .iter()
            .filter(|r| r.is_full() && r.timestamp <= boundary)
            .collect();
        let old_times: Vec<NaiveDateTime> = old_fulls.iter().map(|r| r.timestamp).collect();
        let rotated = gfs::keep(&old_times, &self.policy, boundary);

        // Phase 3: never delete the base of a surviving chain
        let mut fulls = BTreeSet::new();
        for record in old_fulls {
            if rotated.contains(&record.timestamp) {
                continue;
            }
            if anchored.contains(record.path.as_str()) {
                tracing::debug!(path = %record.path, "keeping full backup as base of a hot chain");
                continue;
            }
            fulls.insert(record.path.clone());
        }

        let plan = DeletionPlan {
            retained: records.len() - fulls.len() - incrementals.len(),
            fulls,
            incrementals,
        };
        plan.log_summary();
        plan
    }
}

/// Incrementals to delete, plus the fulls that surviving chains depend on
///
/// Scanning stops at the first full inside the hot window. Before it, each
/// chain (a full and the incrementals that follow it) is dropped unless its
/// newest incremental is itself in the hot window, in which case the whole
/// chain is kept.
fn orphaned_incrementals<'a>(
    records: &'a [BackupRecord],
    boundary: NaiveDateTime,
) -> (BTreeSet<String>, BTreeSet<&'a str>) {
    let mut deleted = BTreeSet::new();
    let mut anchored = BTreeSet::new();

    let mut base: Option<&BackupRecord> = None;
    let mut pending: Vec<&BackupRecord> = Vec::new();

    let mut flush = |base: Option<&'a BackupRecord>, pending: &mut Vec<&'a BackupRecord>| {
        let reaches_hot = pending.last().is_some_and(|r| r.timestamp > boundary);
        if reaches_hot {
            if let Some(base) = base {
                anchored.insert(base.path.as_str());
            }
        } else {
            deleted.extend(pending.iter().map(|r| r.path.clone()));
        }
        pending.clear();
    };

    for record in records {
        if record.is_full() {
            flush(base, &mut pending);
            if record.timestamp > boundary {
                base = None;
                break;
            }
            base = Some(record);
        } else {
            pending.push(record);
        }
    }
    flush(base, &mut pending);

    (deleted, anchored)
}
