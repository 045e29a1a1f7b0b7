//! Physical backup tool invocation

use crate::system_config::ToolConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Lines of stderr kept in the error when the tool fails
const STDERR_TAIL_LINES: usize = 20;

/// Produces and prepares physical backups of the database
#[async_trait]
pub trait BackupTool: Send + Sync {
    /// Take a full backup into `target_dir`
    async fn backup_full(&self, target_dir: &Path) -> Result<()>;

    /// Take an incremental backup of the changes since `base_dir`
    async fn backup_incremental(&self, base_dir: &Path, target_dir: &Path) -> Result<()>;

    /// Make a fetched full backup consistent
    async fn prepare_full(&self, dir: &Path) -> Result<()>;

    /// Apply `incremental_dir` on top of the prepared backup in `dir`
    async fn prepare_incremental(&self, dir: &Path, incremental_dir: &Path) -> Result<()>;
}

/// `mariabackup` run as a child process
#[derive(Debug, Clone)]
pub struct MariaBackup {
    binary: String,
    host: String,
    user: String,
    password: Option<String>,
    extra_args: Vec<String>,
}

impl MariaBackup {
    /// Build from config, reading the password from the configured variable
    pub fn from_config(config: &ToolConfig) -> Self {
        let password = std::env::var(&config.password_env)
            .ok()
            .filter(|p| !p.is_empty());
        if password.is_none() {
            tracing::debug!(var = %config.password_env, "no database password in environment");
        }
        Self {
            binary: config.binary.clone(),
            host: config.host.clone(),
            user: config.user.clone(),
            password,
            extra_args: config.extra_args.clone(),
        }
    }

    fn connection_args(&self) -> Vec<OsString> {
        let mut args = vec![
            OsString::from(format!("--host={}", self.host)),
            OsString::from(format!("--user={}", self.user)),
        ];
        if let Some(password) = &self.password {
            args.push(OsString::from(format!("--password={password}")));
        }
        args
    }

    /// Full argument list for one invocation
    fn args(&self, mode: &[OsString]) -> Vec<OsString> {
        let mut args = self.connection_args();
        args.extend(mode.iter().cloned());
        args.extend(self.extra_args.iter().map(OsString::from));
        args
    }

    async fn run(&self, operation: &str, mode: Vec<OsString>) -> Result<()> {
        let args = self.args(&mode);
        tracing::info!(binary = %self.binary, operation, args = ?mode, "running backup tool");

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to start {}", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "{} {} failed ({}):\n{}",
                self.binary,
                operation,
                output.status,
                stderr_tail(&stderr)
            );
        }

        tracing::debug!(operation, "backup tool finished");
        Ok(())
    }
}

fn dir_arg(flag: &str, dir: &Path) -> OsString {
    let mut arg = OsString::from(flag);
    arg.push("=");
    arg.push(dir.as_os_str());
    arg
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[async_trait]
impl BackupTool for MariaBackup {
    async fn backup_full(&self, target_dir: &Path) -> Result<()> {
        self.run(
            "full backup",
            vec!["--backup".into(), dir_arg("--target-dir", target_dir)],
        )
        .await
    }

    async fn backup_incremental(&self, base_dir: &Path, target_dir: &Path) -> Result<()> {
        self.run(
            "incremental backup",
            vec![
                "--backup".into(),
                dir_arg("--target-dir", target_dir),
                dir_arg("--incremental-basedir", base_dir),
            ],
        )
        .await
    }

    async fn prepare_full(&self, dir: &Path) -> Result<()> {
        self.run(
            "prepare",
            vec!["--prepare".into(), dir_arg("--target-dir", dir)],
        )
        .await
    }

    async fn prepare_incremental(&self, dir: &Path, incremental_dir: &Path) -> Result<()> {
        self.run(
            "prepare incremental",
            vec![
                "--prepare".into(),
                dir_arg("--target-dir", dir),
                dir_arg("--incremental-dir", incremental_dir),
            ],
        )
        .await
    }
}
