//! Shared utilities for CLI commands

use chrono::{Local, NaiveDateTime};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::time::Duration;
use vault_core::naming::parse_timestamp;
use vault_core::BackupRecord;

/// Local wall-clock time, the clock backup names are written in
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// clap value parser for `YYYY-MM-DD HH:mm:ss` arguments
pub fn parse_datetime_arg(value: &str) -> Result<NaiveDateTime, String> {
    parse_timestamp(value).map_err(|e| format!("{e} (expected format: YYYY-MM-DD HH:mm:ss)"))
}

/// Format a timestamp relative to `now` ("2 hours ago")
pub fn format_relative_time(ts: NaiveDateTime, now: NaiveDateTime) -> String {
    let seconds = (now - ts).num_seconds();
    if seconds < 0 {
        return "in the future".to_string();
    }

    if seconds < 60 {
        format!("{} seconds ago", seconds)
    } else if seconds < 3600 {
        format!("{} minutes ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{} hours ago", seconds / 3600)
    } else if seconds < 604800 {
        format!("{} days ago", seconds / 86400)
    } else {
        format!("{} weeks ago", seconds / 604800)
    }
}

/// Format file size in human-readable format
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Spinner for long-running transfers
///
/// Hidden when stderr is not a terminal, so scripted runs stay clean.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Display a backup record on one line
pub fn display_record(record: &BackupRecord, now: NaiveDateTime) {
    let kind = if record.is_full() {
        "full".green().to_string()
    } else {
        "incr".cyan().to_string()
    };
    println!(
        "{}  {}  {}  {}",
        record.formatted_time().yellow(),
        kind,
        format_relative_time(record.timestamp, now).dimmed(),
        record.path.dimmed()
    );
}
