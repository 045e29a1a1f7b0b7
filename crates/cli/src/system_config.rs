//! System-wide configuration for mbvault
//!
//! Config is stored at `~/.config/mbvault/config.toml` (Linux/macOS) or
//! `%APPDATA%\mbvault\config.toml` (Windows). `MBVAULT_CONFIG` points at a
//! different file. Environment variables from the deployment image
//! (`S3_PATH`, `S3_BUCKET`, ...) override values read from the file.

use anyhow::{Context, Result};
use planner::{RetentionPolicy, DEFAULT_RETENTION};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vault_core::store::{S3Options, DEFAULT_REMOVE_CONCURRENCY};
use vault_core::ObjectStoreBackend;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "MBVAULT_CONFIG";

/// System-wide mbvault configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Where backups are stored
    pub storage: StorageConfig,

    /// The physical backup tool
    pub tool: ToolConfig,

    /// Local directories
    pub paths: PathsConfig,

    /// Notification hooks
    pub hooks: HooksConfig,

    /// Retention defaults for `mbv prune`
    pub prune: PruneConfig,

    /// Log output
    pub logging: LoggingConfig,
}

/// Storage backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    S3,
    Local,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend kind (default: s3)
    pub backend: StorageBackend,

    /// Storage prefix used when `--path` is not given
    pub path: Option<String>,

    /// S3 bucket name
    pub bucket: Option<String>,

    /// S3 region (default: eu-west-1)
    pub region: String,

    /// Custom S3 endpoint (MinIO, Ceph, ...)
    pub endpoint: Option<String>,

    /// Root directory for the local backend
    pub local_root: Option<PathBuf>,

    /// Timeout for each store call in seconds, 0 disables it (default: 0)
    pub timeout_secs: u64,

    /// Concurrent removals during prune (default: 8)
    pub remove_concurrency: usize,

    /// Credentials are only ever read from the environment
    #[serde(skip)]
    pub access_key_id: Option<String>,

    #[serde(skip)]
    pub secret_access_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            path: None,
            bucket: None,
            region: "eu-west-1".to_string(),
            endpoint: None,
            local_root: None,
            timeout_secs: 0,
            remove_concurrency: DEFAULT_REMOVE_CONCURRENCY,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

impl StorageConfig {
    /// Open the configured backend
    pub fn open(&self) -> Result<ObjectStoreBackend> {
        let store = match self.backend {
            StorageBackend::S3 => {
                let bucket = self
                    .bucket
                    .clone()
                    .context("No S3 bucket configured (set storage.bucket or S3_BUCKET)")?;
                ObjectStoreBackend::s3(&S3Options {
                    bucket,
                    region: self.region.clone(),
                    access_key_id: self.access_key_id.clone(),
                    secret_access_key: self.secret_access_key.clone(),
                    endpoint: self.endpoint.clone(),
                })?
            }
            StorageBackend::Local => {
                let root = self
                    .local_root
                    .as_deref()
                    .context("No local storage root configured (set storage.local_root)")?;
                ObjectStoreBackend::local(root)?
            }
        };

        let store = store.with_remove_concurrency(self.remove_concurrency);
        Ok(match self.timeout_secs {
            0 => store,
            secs => store.with_timeout(Duration::from_secs(secs)),
        })
    }
}

/// Backup tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Backup binary (default: mariabackup)
    pub binary: String,

    /// Database host (default: 127.0.0.1)
    pub host: String,

    /// Database user (default: root)
    pub user: String,

    /// Environment variable holding the password (default: MYSQL_ROOT_PASSWORD)
    pub password_env: String,

    /// Extra arguments appended to every invocation
    pub extra_args: Vec<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            binary: "mariabackup".to_string(),
            host: "127.0.0.1".to_string(),
            user: "root".to_string(),
            password_env: "MYSQL_ROOT_PASSWORD".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Local directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Working directory holding the incremental base, restores and the lock
    /// (default: /var/lib/mysql)
    pub data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/mysql"),
        }
    }
}

/// Hook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    /// Run hook scripts (default: true)
    pub enabled: bool,

    /// Directory searched for `backup-started`, `backup-success` and
    /// `backup-failed` (default: <config_dir>/hooks)
    pub dir: Option<PathBuf>,

    /// Upper bound on each hook run in seconds (default: 60)
    pub timeout_secs: u64,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            timeout_secs: 60,
        }
    }
}

impl HooksConfig {
    pub fn hooks_dir(&self) -> Option<PathBuf> {
        self.dir
            .clone()
            .or_else(|| config_dir().map(|d| d.join("hooks")))
    }
}

/// Prune configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PruneConfig {
    /// Retention used when `--retention` is not given
    pub retention: String,
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION.to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write a daily-rotated log file here
    pub dir: Option<PathBuf>,
}

impl SystemConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.storage.timeout_secs > 86_400 {
            anyhow::bail!("storage.timeout_secs must be between 0 and 86400");
        }
        if !(1..=256).contains(&self.storage.remove_concurrency) {
            anyhow::bail!("storage.remove_concurrency must be between 1 and 256");
        }
        if !(1..=3600).contains(&self.hooks.timeout_secs) {
            anyhow::bail!("hooks.timeout_secs must be between 1 and 3600");
        }
        if self.tool.binary.trim().is_empty() {
            anyhow::bail!("tool.binary must not be empty");
        }
        RetentionPolicy::parse(Some(&self.prune.retention))
            .context("prune.retention is not a usable retention policy")?;
        Ok(())
    }

    /// Apply deployment environment variables on top of file values
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Same as [`apply_env`](Self::apply_env) with an explicit lookup
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.storage.path.is_none() {
            self.storage.path = var("S3_PATH");
        }
        if let Some(bucket) = var("S3_BUCKET") {
            self.storage.bucket = Some(bucket);
        }
        if let Some(region) = var("S3_REGION") {
            self.storage.region = region;
        }
        if let Some(key) = var("S3_KEY") {
            self.storage.access_key_id = Some(key);
        }
        if let Some(secret) = var("S3_SECRET") {
            self.storage.secret_access_key = Some(secret);
        }
        if let Some(dir) = var("MYSQL_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(dir);
        }
    }

    /// Storage prefix from `--path`, then config, then `S3_PATH`
    pub fn storage_path(&self, arg: Option<&str>) -> Result<String> {
        arg.map(str::to_string)
            .or_else(|| self.storage.path.clone())
            .filter(|p| !p.trim().is_empty())
            .context("No storage path given (use --path, storage.path or S3_PATH)")
    }
}

/// Get the system config directory path
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs::home_dir().map(|h| h.join(".config/mbvault"))
    }

    #[cfg(not(target_os = "macos"))]
    {
        dirs::config_dir().map(|c| c.join("mbvault"))
    }
}

/// Get the system config file path
pub fn config_file_path() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => config_dir().map(|d| d.join("config.toml")),
    }
}

/// Load the configuration file and apply environment overrides
///
/// Returns defaults (plus environment) if the file doesn't exist.
pub fn load() -> Result<SystemConfig> {
    let mut config = match config_file_path() {
        Some(path) => load_from(&path)?,
        None => {
            tracing::debug!("Could not determine config directory, using defaults");
            SystemConfig::default()
        }
    };
    config.apply_env();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Load configuration from a specific file, without environment overrides
pub fn load_from(path: &Path) -> Result<SystemConfig> {
    if !path.exists() {
        tracing::debug!("Config not found at {}, using defaults", path.display());
        return Ok(SystemConfig::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;

    let config: SystemConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config at {}", path.display()))?;

    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

fn save_to(config: &SystemConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory at {}", parent.display()))?;
    }

    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, &content)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    tracing::info!("Saved config to {}", path.display());
    Ok(())
}

/// Initialize the config file with defaults if it doesn't exist
pub fn init_if_missing() -> Result<Option<PathBuf>> {
    let config_path = match config_file_path() {
        Some(p) => p,
        None => return Ok(None),
    };

    if config_path.exists() {
        return Ok(None);
    }

    save_to(&SystemConfig::default(), &config_path)?;
    Ok(Some(config_path))
}

/// Generate example config content for display
pub fn example_config() -> String {
    let config = SystemConfig::default();
    let mut content = String::from("# mbvault configuration\n");
    content.push_str("# Location: ~/.config/mbvault/config.toml (or $MBVAULT_CONFIG)\n");
    content.push_str("#\n");
    content.push_str("# S3_PATH, S3_BUCKET, S3_REGION, S3_KEY, S3_SECRET and MYSQL_DATA_DIR\n");
    content.push_str("# override the values below. Credentials are never read from this file.\n\n");

    content.push_str(&toml::to_string_pretty(&config).unwrap_or_default());
    content
}
