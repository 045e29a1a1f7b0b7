//! Delete backups that fall outside the retention policy

use crate::system_config;
use crate::util;
use crate::workflow;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use planner::RetentionPolicy;

pub async fn run(path: Option<&str>, retention: Option<&str>, dry_run: bool) -> Result<()> {
    let config = system_config::load()?;
    let prefix = config.storage_path(path)?;
    let spec = retention.unwrap_or(config.prune.retention.as_str());
    let policy = RetentionPolicy::parse(Some(spec))
        .with_context(|| format!("Invalid retention policy '{}'", spec))?;

    let store = config.storage.open().context("Failed to open backup storage")?;
    let report = workflow::prune(&store, &prefix, policy, util::now(), dry_run).await?;

    if report.dry_run {
        println!("{}", "Prune (dry run)".bold());
    } else {
        println!("{}", "Prune Complete".green().bold());
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Policy: {}", report.policy.to_string().cyan());
    println!();

    let plan = &report.plan;
    if plan.is_empty() {
        println!("{}", "Nothing to delete".dimmed());
        return Ok(());
    }

    let verb = if report.dry_run { "Would delete" } else { "Deleted" };
    for path in &plan.fulls {
        println!("  {} {}", "full".red(), path);
    }
    for path in &plan.incrementals {
        println!("  {} {}", "incr".red(), path);
    }
    println!();
    println!("{} fulls:        {}", verb, plan.fulls.len().to_string().yellow());
    println!("{} incrementals: {}", verb, plan.incrementals.len().to_string().yellow());
    println!("Retained:            {}", plan.retained.to_string().green());

    Ok(())
}
