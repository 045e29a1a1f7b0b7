//! List stored backups

use crate::system_config;
use crate::util;
use crate::workflow;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use vault_core::ListFilter;

pub async fn run(path: Option<&str>, filter: ListFilter) -> Result<()> {
    let config = system_config::load()?;
    let prefix = config.storage_path(path)?;
    let store = config.storage.open().context("Failed to open backup storage")?;

    let records = workflow::list(&store, &prefix, &filter).await?;

    if records.is_empty() {
        println!("{}", "No backups found".dimmed());
        return Ok(());
    }

    let now = util::now();
    for record in &records {
        util::display_record(record, now);
    }

    let fulls = records.iter().filter(|r| r.is_full()).count();
    println!();
    println!(
        "{} backups ({} full, {} incremental)",
        records.len().to_string().bold(),
        fulls,
        records.len() - fulls
    );

    Ok(())
}
