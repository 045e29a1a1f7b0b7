//! Configuration management command
//!
//! Provides CLI interface to view the effective configuration.

use crate::system_config::{self, StorageBackend};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::fmt::Display;
use std::path::Path;

fn show(key: &str, value: impl Display) {
    println!("  {} = {}", key.cyan(), value);
}

fn show_opt<T: Display>(key: &str, value: Option<T>) {
    match value {
        Some(v) => show(key, v),
        None => println!("  {} = {}", key.cyan(), "(unset)".dimmed()),
    }
}

fn show_path(key: &str, value: Option<&Path>) {
    show_opt(key, value.map(|p| p.display()))
}

/// List the effective configuration (file plus environment)
pub async fn run_list() -> Result<()> {
    let config = system_config::load()?;
    let config_path = system_config::config_file_path()
        .context("Could not determine config file path")?;

    println!("{}", "mbvault Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), config_path.display().dimmed());

    println!("{}", "[storage]".yellow());
    let backend = match config.storage.backend {
        StorageBackend::S3 => "s3",
        StorageBackend::Local => "local",
    };
    show("backend", backend);
    show_opt("path", config.storage.path.as_deref());
    show_opt("bucket", config.storage.bucket.as_deref());
    show("region", &config.storage.region);
    show_opt("endpoint", config.storage.endpoint.as_deref());
    show_path("local_root", config.storage.local_root.as_deref());
    println!(
        "  {} = {} {}",
        "timeout_secs".cyan(),
        config.storage.timeout_secs,
        if config.storage.timeout_secs == 0 {
            "(no timeout)".dimmed().to_string()
        } else {
            format!("({}s)", config.storage.timeout_secs).dimmed().to_string()
        }
    );
    show("remove_concurrency", config.storage.remove_concurrency);
    println!(
        "  {} {}",
        "credentials".cyan(),
        if config.storage.access_key_id.is_some() {
            "from S3_KEY/S3_SECRET".dimmed().to_string()
        } else {
            "from the default AWS chain".dimmed().to_string()
        }
    );

    println!("\n{}", "[tool]".yellow());
    show("binary", &config.tool.binary);
    show("host", &config.tool.host);
    show("user", &config.tool.user);
    show("password_env", &config.tool.password_env);
    show("extra_args", format!("{:?}", config.tool.extra_args));

    println!("\n{}", "[paths]".yellow());
    show("data_dir", config.paths.data_dir.display());

    println!("\n{}", "[hooks]".yellow());
    show("enabled", config.hooks.enabled);
    show_path("dir", config.hooks.hooks_dir().as_deref());
    show("timeout_secs", config.hooks.timeout_secs);

    println!("\n{}", "[prune]".yellow());
    show("retention", &config.prune.retention);

    println!("\n{}", "[logging]".yellow());
    show_path("dir", config.logging.dir.as_deref());

    println!("\n{}", "Valid Ranges:".bold());
    println!("  storage.timeout_secs: 0-86400 (0 = no timeout)");
    println!("  storage.remove_concurrency: 1-256");
    println!("  hooks.timeout_secs: 1-3600");

    Ok(())
}

/// Show the config file path and optionally create it
pub async fn run_path(create: bool) -> Result<()> {
    let config_path = system_config::config_file_path()
        .context("Could not determine config file path")?;

    if create && !config_path.exists() {
        system_config::init_if_missing()?;
        println!("{} Created config file at: {}", "✓".green(), config_path.display());
    } else if config_path.exists() {
        println!("{}", config_path.display());
    } else {
        println!("{}", config_path.display());
        println!("{}", "File does not exist. Use --create to create it.".yellow());
    }

    Ok(())
}

/// Show example configuration
pub async fn run_example() -> Result<()> {
    println!("{}", system_config::example_config());
    Ok(())
}
