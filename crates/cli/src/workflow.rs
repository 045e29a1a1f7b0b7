//! Backup workflows: create, restore, prune, list
//!
//! The working directory layout:
//!
//! ```text
//! <work_dir>/
//!   .mbvault.lock      held during create and restore
//!   backup/            last successful backup, the incremental base
//!   restore/           result of the last restore
//!   .staging/          scratch space, same filesystem as the above
//! ```

use crate::hooks::{BackupEvent, Notifications};
use crate::locks::WorkdirLock;
use crate::tool::BackupTool;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use planner::{DeletionPlan, RetentionPlanner, RetentionPolicy};
use std::path::{Path, PathBuf};
use vault_core::{BackupKind, BackupRecord, BackupStore, Catalog, ListFilter};

/// Paths inside a working directory
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Base for the next incremental backup
    pub fn base_dir(&self) -> PathBuf {
        self.root.join("backup")
    }

    pub fn restore_dir(&self) -> PathBuf {
        self.root.join("restore")
    }

    fn staging_root(&self) -> PathBuf {
        self.root.join(".staging")
    }

    /// Empty path under the staging area, leftovers from earlier runs removed
    fn fresh_staging(&self, name: &str) -> Result<PathBuf> {
        let root = self.staging_root();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create staging directory {}", root.display()))?;
        let path = root.join(name);
        remove_dir_if_exists(&path)?;
        Ok(path)
    }

    fn clean_staging(&self) {
        if let Err(e) = remove_dir_if_exists(&self.staging_root()) {
            tracing::warn!(error = %e, "failed to clean staging directory");
        }
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

/// Replace `dest` with `staged` by rename
fn publish(staged: &Path, dest: &Path) -> Result<()> {
    remove_dir_if_exists(dest)?;
    std::fs::rename(staged, dest)
        .with_context(|| format!("Failed to move {} to {}", staged.display(), dest.display()))
}

/// Outcome of a successful create
#[derive(Debug, Clone)]
pub struct CreateReport {
    pub record: BackupRecord,
    pub bytes: u64,
}

/// Outcome of a successful restore
#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub chain: Vec<BackupRecord>,
    pub restore_dir: PathBuf,
    pub bytes: u64,
}

/// Outcome of a prune
#[derive(Debug, Clone)]
pub struct PruneReport {
    pub plan: DeletionPlan,
    pub policy: RetentionPolicy,
    pub dry_run: bool,
}

/// Collaborators shared by create and restore
pub struct BackupJob<'a> {
    pub store: &'a dyn BackupStore,
    pub tool: &'a dyn BackupTool,
    pub notifications: &'a Notifications,
    pub workspace: &'a Workspace,
    pub prefix: &'a str,
}

impl BackupJob<'_> {
    /// Take a backup and upload it
    ///
    /// A full backup is taken when `force_full` is set or when there is no
    /// local base to build an incremental on. `now` names the artifact.
    pub async fn create(
        &self,
        lock: &WorkdirLock,
        force_full: bool,
        now: NaiveDateTime,
    ) -> Result<CreateReport> {
        tracing::debug!(lock = %lock.work_dir().display(), "create holds the working directory lock");
        self.notifications.notify(BackupEvent::Started, self.prefix).await;

        let result = self.create_inner(force_full, now).await;
        match &result {
            Ok(_) => self.notifications.notify(BackupEvent::Succeeded, self.prefix).await,
            Err(e) => {
                self.notifications
                    .notify(BackupEvent::Failed(format!("{e:#}")), self.prefix)
                    .await
            }
        }
        self.workspace.clean_staging();
        result
    }

    async fn create_inner(&self, force_full: bool, now: NaiveDateTime) -> Result<CreateReport> {
        let base = self.workspace.base_dir();
        let kind = if force_full || !base.is_dir() {
            BackupKind::Full
        } else {
            BackupKind::Incremental
        };
        if !force_full && kind.is_full() {
            tracing::info!(base = %base.display(), "no local base backup, taking a full backup");
        }

        let record = BackupRecord::new(self.prefix, now, kind);
        let staging = self.workspace.fresh_staging("backup")?;

        match kind {
            BackupKind::Full => self.tool.backup_full(&staging).await?,
            BackupKind::Incremental => self.tool.backup_incremental(&base, &staging).await?,
        }

        let bytes = match self.store.push(&staging, &record.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.discard_upload(&record.path).await;
                return Err(e).with_context(|| format!("Failed to upload {}", record.path));
            }
        };

        publish(&staging, &base)?;
        tracing::info!(path = %record.path, kind = %record.kind, bytes, "backup stored");

        Ok(CreateReport { record, bytes })
    }

    /// Drop whatever part of a failed upload reached the store
    ///
    /// A half-written artifact decodes like a good one, so leaving it would
    /// let restores and GFS rotation pick it up.
    async fn discard_upload(&self, path: &str) {
        match self.store.remove(&[path.to_string()]).await {
            Ok(()) => tracing::warn!(%path, "removed partially uploaded backup"),
            Err(e) => tracing::error!(
                %path,
                error = %e,
                "could not remove partially uploaded backup; delete it by hand"
            ),
        }
    }

    /// Rebuild the database state as of `target` into `<work_dir>/restore`
    pub async fn restore(&self, lock: &WorkdirLock, target: NaiveDateTime) -> Result<RestoreReport> {
        tracing::debug!(lock = %lock.work_dir().display(), "restore holds the working directory lock");
        let result = self.restore_inner(target).await;
        self.workspace.clean_staging();
        result
    }

    async fn restore_inner(&self, target: NaiveDateTime) -> Result<RestoreReport> {
        let catalog = Catalog::list(self.store, self.prefix).await?;
        let chain = planner::resolve(catalog.records(), target)?;

        let restore_dir = self.workspace.restore_dir();
        if restore_dir.exists() {
            anyhow::bail!(
                "Restore directory {} already exists; move it away first",
                restore_dir.display()
            );
        }

        tracing::info!(
            target = %target,
            base = %chain[0].path,
            incrementals = chain.len() - 1,
            "restoring backup chain"
        );

        let staged = self.workspace.fresh_staging("restore")?;
        let mut bytes = 0;

        for record in &chain {
            let part = self.workspace.fresh_staging("part")?;
            std::fs::create_dir_all(&part)
                .with_context(|| format!("Failed to create {}", part.display()))?;

            bytes += self
                .store
                .fetch(&record.path, &part)
                .await
                .with_context(|| format!("Failed to download {}", record.path))?;

            match record.kind {
                BackupKind::Full => {
                    std::fs::rename(&part, &staged)
                        .with_context(|| format!("Failed to stage {}", record.path))?;
                    self.tool.prepare_full(&staged).await?;
                }
                BackupKind::Incremental => {
                    self.tool.prepare_incremental(&staged, &part).await?;
                }
            }
            tracing::debug!(path = %record.path, "applied chain member");
        }

        publish(&staged, &restore_dir)?;

        Ok(RestoreReport {
            chain,
            restore_dir,
            bytes,
        })
    }
}

/// Plan deletions under `policy` and, unless `dry_run`, execute them
pub async fn prune(
    store: &dyn BackupStore,
    prefix: &str,
    policy: RetentionPolicy,
    now: NaiveDateTime,
    dry_run: bool,
) -> Result<PruneReport> {
    tracing::info!(prefix, policy = %policy, dry_run, "pruning backups");

    let catalog = Catalog::list(store, prefix).await?;
    let plan = RetentionPlanner::new(policy).plan(catalog.records(), now);

    if !dry_run && !plan.is_empty() {
        let paths: Vec<String> = plan.paths().into_iter().collect();
        store.remove(&paths).await?;
        tracing::info!(removed = paths.len(), "backups removed");
    }

    Ok(PruneReport {
        plan,
        policy,
        dry_run,
    })
}

/// Catalog records under `prefix` that pass `filter`
pub async fn list(store: &dyn BackupStore, prefix: &str, filter: &ListFilter) -> Result<Vec<BackupRecord>> {
    let catalog = Catalog::list(store, prefix).await?;
    Ok(catalog.filter(filter))
}
