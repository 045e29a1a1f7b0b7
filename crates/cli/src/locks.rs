//! Working directory lock
//!
//! Creating and restoring backups both write into the working directory, so
//! only one of them may run at a time on a host. Exclusion rests entirely on
//! an advisory `flock` over `<work_dir>/.mbvault.lock`: the kernel drops it
//! when the holder exits, however it exits, so there is no stale state to
//! clean up. The lock file itself is never removed. Unlinking it would let a
//! waiter that already opened the old inode lock it alongside a newcomer
//! locking a fresh file.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = ".mbvault.lock";

/// Exclusive lock on a working directory
///
/// Held for the whole of a create or restore; dropping it closes the file,
/// which releases the flock.
pub struct WorkdirLock {
    work_dir: PathBuf,
    _file: File,
}

/// Who holds the lock, for the "in progress" message only
#[derive(Debug, Serialize, Deserialize)]
struct Holder {
    pid: u32,
    started_at: DateTime<Local>,
}

impl WorkdirLock {
    /// Take the lock for `work_dir`, creating the directory if needed
    ///
    /// Fails immediately when any other open file description holds the
    /// flock, in this process or another.
    pub fn acquire(work_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(work_dir)
            .with_context(|| format!("Failed to create working directory {}", work_dir.display()))?;
        let lock_path = work_dir.join(LOCK_FILE);

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;

        if !try_flock_exclusive(&file)? {
            // The holder may not have written its pid yet
            let holder = read_holder(&mut file)
                .map(|h| format!(" by pid {} since {}", h.pid, h.started_at.format("%Y-%m-%d %H:%M:%S")))
                .unwrap_or_default();
            anyhow::bail!("Backup in progress (lock held{holder}). Please try again later");
        }

        write_holder(&mut file).context("Failed to record lock holder")?;
        tracing::debug!(path = %lock_path.display(), "acquired working directory lock");

        Ok(Self {
            work_dir: work_dir.to_path_buf(),
            _file: file,
        })
    }

    /// Directory this lock protects
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

fn write_holder(file: &mut File) -> Result<()> {
    let holder = Holder {
        pid: std::process::id(),
        started_at: Local::now(),
    };
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    serde_json::to_writer(&mut *file, &holder)?;
    file.flush()?;
    Ok(())
}

fn read_holder(file: &mut File) -> Result<Holder> {
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Non-blocking exclusive flock; `false` when someone else holds it
#[cfg(unix)]
fn try_flock_exclusive(file: &File) -> Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e).context("Failed to lock working directory"),
    }
}
