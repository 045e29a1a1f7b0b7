//! Test doubles and scratch environments

use anyhow::{Context, Result};
use async_trait::async_trait;
use cli_lib::hooks::{BackupEvent, Notifier};
use cli_lib::tool::BackupTool;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use vault_core::BackupStore;

/// In-process stand-in for mariabackup over an append-only "database"
///
/// A full backup writes every row to `data.txt`; an incremental writes the
/// rows added since its base to `delta.txt`. Each backup records the row
/// count it covers in `checkpoint`, and applying an incremental whose `from`
/// does not match the prepared checkpoint fails, like applying deltas out
/// of order would.
#[derive(Default)]
pub struct FakeTool {
    rows: Mutex<Vec<String>>,
    fail_next: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl FakeTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, row: &str) {
        self.rows.lock().unwrap().push(row.to_string());
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn enter(&self, call: &str) -> Result<()> {
        self.calls.lock().unwrap().push(call.to_string());
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("mariabackup {call} failed (exit status: 1)");
        }
        Ok(())
    }

    fn lines(rows: &[String]) -> String {
        rows.iter().map(|r| format!("{r}\n")).collect()
    }
}

fn read_number(path: &Path) -> Result<usize> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("missing {}", path.display()))?;
    Ok(text.trim().parse()?)
}

#[async_trait]
impl BackupTool for FakeTool {
    async fn backup_full(&self, target_dir: &Path) -> Result<()> {
        self.enter("backup_full")?;
        let rows = self.rows.lock().unwrap().clone();
        std::fs::create_dir_all(target_dir)?;
        std::fs::write(target_dir.join("data.txt"), Self::lines(&rows))?;
        std::fs::write(target_dir.join("checkpoint"), rows.len().to_string())?;
        Ok(())
    }

    async fn backup_incremental(&self, base_dir: &Path, target_dir: &Path) -> Result<()> {
        self.enter("backup_incremental")?;
        let from = read_number(&base_dir.join("checkpoint"))?;
        let rows = self.rows.lock().unwrap().clone();
        std::fs::create_dir_all(target_dir)?;
        std::fs::write(target_dir.join("delta.txt"), Self::lines(&rows[from..]))?;
        std::fs::write(target_dir.join("from"), from.to_string())?;
        std::fs::write(target_dir.join("checkpoint"), rows.len().to_string())?;
        Ok(())
    }

    async fn prepare_full(&self, dir: &Path) -> Result<()> {
        self.enter("prepare_full")?;
        std::fs::write(dir.join("prepared"), "")?;
        Ok(())
    }

    async fn prepare_incremental(&self, dir: &Path, incremental_dir: &Path) -> Result<()> {
        self.enter("prepare_incremental")?;
        let at = read_number(&dir.join("checkpoint"))?;
        let from = read_number(&incremental_dir.join("from"))?;
        if at != from {
            anyhow::bail!("incremental starts at {from} but backup is at {at}");
        }

        let mut data = std::fs::read_to_string(dir.join("data.txt"))?;
        data.push_str(&std::fs::read_to_string(incremental_dir.join("delta.txt"))?);
        std::fs::write(dir.join("data.txt"), data)?;
        std::fs::copy(incremental_dir.join("checkpoint"), dir.join("checkpoint"))?;
        Ok(())
    }
}

/// Records every event it is sent
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<(BackupEvent, String)>>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<BackupEvent> {
        self.events.lock().unwrap().iter().map(|(e, _)| e.clone()).collect()
    }

    pub fn paths(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|(_, p)| p.clone()).collect()
    }
}

#[async_trait]
impl Notifier for Recorder {
    async fn notify(&self, event: &BackupEvent, storage_path: &str) {
        self.events
            .lock()
            .unwrap()
            .push((event.clone(), storage_path.to_string()));
    }
}

/// Upload a one-file artifact to each of `paths`
pub async fn seed(store: &dyn BackupStore, paths: &[&str]) {
    let scratch = TempDir::new().unwrap();
    std::fs::write(scratch.path().join("xtrabackup_checkpoints"), b"backup_type = full").unwrap();
    for path in paths {
        store.push(scratch.path(), path).await.unwrap();
    }
}

/// Write a one-file artifact straight into a local store root
pub fn seed_local(root: &Path, paths: &[&str]) {
    for path in paths {
        let dir = root.join(path);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("xtrabackup_checkpoints"), b"backup_type = full").unwrap();
    }
}

/// Scratch layout for running the `mbv` binary against a local store
pub struct CliEnv {
    pub temp: TempDir,
    pub config_path: PathBuf,
    pub store_root: PathBuf,
    pub data_dir: PathBuf,
    pub hooks_dir: PathBuf,
}

impl CliEnv {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().to_path_buf();
        let env = Self {
            config_path: root.join("config.toml"),
            store_root: root.join("store"),
            data_dir: root.join("mysql"),
            hooks_dir: root.join("hooks"),
            temp,
        };
        std::fs::create_dir_all(&env.store_root).unwrap();
        std::fs::create_dir_all(&env.hooks_dir).unwrap();
        env.write_config(&env.temp.path().join("no-such-tool"));
        env
    }

    /// Rewrite the config pointing the backup tool at `binary`
    pub fn write_config(&self, binary: &Path) {
        let config = format!(
            r#"[storage]
backend = "local"
path = "db"
local_root = "{store}"

[tool]
binary = "{binary}"

[paths]
data_dir = "{data}"

[hooks]
dir = "{hooks}"
timeout_secs = 10
"#,
            store = self.store_root.display(),
            binary = binary.display(),
            data = self.data_dir.display(),
            hooks = self.hooks_dir.display(),
        );
        std::fs::write(&self.config_path, config).unwrap();
    }

    /// Install a shell stand-in for mariabackup and point the config at it
    ///
    /// It creates `--target-dir` and writes one file into it, so create
    /// and restore run end to end.
    #[cfg(unix)]
    pub fn install_fake_mariabackup(&self) {
        let script = self.temp.path().join("mariabackup");
        write_script(
            &script,
            r#"dir=""
for arg in "$@"; do
  case "$arg" in
    --target-dir=*) dir="${arg#--target-dir=}" ;;
  esac
done
[ -n "$dir" ] || exit 2
mkdir -p "$dir" && echo "$*" >> "$dir/xtrabackup_info""#,
        );
        self.write_config(&script);
    }

    #[cfg(unix)]
    pub fn install_hook(&self, name: &str, body: &str) {
        write_script(&self.hooks_dir.join(name), body);
    }

    /// Artifact names currently in the store under `db`
    pub fn stored(&self) -> Vec<String> {
        let mut names: Vec<String> = match std::fs::read_dir(self.store_root.join("db")) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }
}

#[cfg(unix)]
fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}
