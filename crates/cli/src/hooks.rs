//! Backup lifecycle notifications
//!
//! Every create fires `Started` and then exactly one of `Succeeded` or
//! `Failed`. Notifiers never fail the backup: problems are logged and
//! swallowed.

use crate::system_config::HooksConfig;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;

/// Backup lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupEvent {
    Started,
    Succeeded,
    Failed(String),
}

impl BackupEvent {
    /// Hook script name for this event
    pub fn hook_name(&self) -> &'static str {
        match self {
            BackupEvent::Started => "backup-started",
            BackupEvent::Succeeded => "backup-success",
            BackupEvent::Failed(_) => "backup-failed",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `event` for the backups kept under the storage prefix `storage_path`
    async fn notify(&self, event: &BackupEvent, storage_path: &str);

    /// Wait for deliveries still in flight
    async fn settle(&self) {}
}

/// Writes events to the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &BackupEvent, storage_path: &str) {
        match event {
            BackupEvent::Started => tracing::info!(path = storage_path, "backup started"),
            BackupEvent::Succeeded => tracing::info!(path = storage_path, "backup succeeded"),
            BackupEvent::Failed(message) => {
                tracing::error!(path = storage_path, error = %message, "backup failed")
            }
        }
    }
}

/// Runs `<dir>/<hook-name> <storage_path> [message]` when the script exists
pub struct HookNotifier {
    dir: PathBuf,
    timeout: Duration,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl HookNotifier {
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            timeout,
            pending: Mutex::new(Vec::new()),
        }
    }

    fn spawn_hook(&self, event: &BackupEvent, storage_path: &str) {
        let script = self.dir.join(event.hook_name());
        if !script.is_file() {
            tracing::debug!(hook = %script.display(), "no hook script, skipping");
            return;
        }

        let mut command = Command::new(&script);
        command
            .arg(storage_path)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let BackupEvent::Failed(message) = event {
            command.arg(message);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(hook = %script.display(), error = %e, "failed to start hook");
                return;
            }
        };

        let limit = self.timeout;
        let handle = tokio::spawn(async move {
            match tokio::time::timeout(limit, child.wait()).await {
                Ok(Ok(status)) if status.success() => {
                    tracing::debug!(hook = %script.display(), "hook finished");
                }
                Ok(Ok(status)) => {
                    tracing::warn!(hook = %script.display(), %status, "hook exited with failure");
                }
                Ok(Err(e)) => {
                    tracing::warn!(hook = %script.display(), error = %e, "hook could not be awaited");
                }
                Err(_) => {
                    tracing::warn!(
                        hook = %script.display(),
                        timeout_secs = limit.as_secs(),
                        "hook timed out, killing it"
                    );
                    let _ = child.kill().await;
                }
            }
        });

        if let Ok(mut pending) = self.pending.lock() {
            pending.push(handle);
        }
    }
}

#[async_trait]
impl Notifier for HookNotifier {
    async fn notify(&self, event: &BackupEvent, storage_path: &str) {
        self.spawn_hook(event, storage_path);
    }

    async fn settle(&self) {
        let handles: Vec<_> = match self.pending.lock() {
            Ok(mut pending) => pending.drain(..).collect(),
            Err(_) => return,
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "hook task panicked");
            }
        }
    }
}

/// Fan-out over every configured notifier
#[derive(Default)]
pub struct Notifications {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log notifier plus hook scripts when enabled
    pub fn from_config(config: &HooksConfig) -> Self {
        let mut notifications = Self::new().with(LogNotifier);
        if config.enabled {
            if let Some(dir) = config.hooks_dir() {
                notifications = notifications
                    .with(HookNotifier::new(dir, Duration::from_secs(config.timeout_secs)));
            }
        }
        notifications
    }

    pub fn with(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifiers.push(Box::new(notifier));
        self
    }

    pub async fn notify(&self, event: BackupEvent, storage_path: &str) {
        for notifier in &self.notifiers {
            notifier.notify(&event, storage_path).await;
        }
    }

    pub async fn settle(&self) {
        for notifier in &self.notifiers {
            notifier.settle().await;
        }
    }
}
