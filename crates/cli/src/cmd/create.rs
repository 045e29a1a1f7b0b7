//! Create a backup

use crate::hooks::Notifications;
use crate::locks::WorkdirLock;
use crate::system_config;
use crate::tool::MariaBackup;
use crate::util;
use crate::workflow::{BackupJob, Workspace};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;

pub async fn run(path: Option<&str>, full: bool) -> Result<()> {
    let config = system_config::load()?;
    let prefix = config.storage_path(path)?;
    let workspace = Workspace::new(&config.paths.data_dir);

    let lock = WorkdirLock::acquire(workspace.root())?;

    let store = config.storage.open().context("Failed to open backup storage")?;
    let tool = MariaBackup::from_config(&config.tool);
    let notifications = Notifications::from_config(&config.hooks);

    let job = BackupJob {
        store: &store,
        tool: &tool,
        notifications: &notifications,
        workspace: &workspace,
        prefix: &prefix,
    };

    let spinner = util::spinner(format!("Backing up to {}", prefix));
    let result = job.create(&lock, full, util::now()).await;
    spinner.finish_and_clear();
    notifications.settle().await;
    drop(lock);

    let report = result?;
    println!(
        "{} {} backup stored at {}",
        "✓".green(),
        report.record.kind,
        report.record.path.cyan()
    );
    println!("  {}", util::format_size(report.bytes).dimmed());

    Ok(())
}
