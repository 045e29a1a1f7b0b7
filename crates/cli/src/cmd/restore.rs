//! Restore a backup chain into the working directory

use crate::hooks::Notifications;
use crate::locks::WorkdirLock;
use crate::system_config;
use crate::tool::MariaBackup;
use crate::util;
use crate::workflow::{BackupJob, Workspace};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use owo_colors::OwoColorize;

pub async fn run(target: NaiveDateTime, path: Option<&str>) -> Result<()> {
    let config = system_config::load()?;
    let prefix = config.storage_path(path)?;
    let workspace = Workspace::new(&config.paths.data_dir);

    let lock = WorkdirLock::acquire(workspace.root())?;

    let store = config.storage.open().context("Failed to open backup storage")?;
    let tool = MariaBackup::from_config(&config.tool);
    // Restores have no lifecycle hooks
    let notifications = Notifications::new();

    let job = BackupJob {
        store: &store,
        tool: &tool,
        notifications: &notifications,
        workspace: &workspace,
        prefix: &prefix,
    };

    let spinner = util::spinner(format!("Restoring {} as of {}", prefix, target));
    let result = job.restore(&lock, target).await;
    spinner.finish_and_clear();
    drop(lock);

    let report = result?;

    println!("{}", "Restore Complete".green().bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for record in &report.chain {
        println!("  {} {}", record.kind.to_string().dimmed(), record.path.cyan());
    }
    println!();
    println!("Downloaded: {}", util::format_size(report.bytes).yellow());
    println!("Restored to: {}", report.restore_dir.display().green());

    Ok(())
}
