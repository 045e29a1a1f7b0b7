//! Object store collaborator
//!
//! The catalog and workflows only talk to storage through [`BackupStore`].
//! [`ObjectStoreBackend`] implements it on top of the `object_store` crate so
//! the same code drives S3, a local directory, or an in-memory store in tests.

use crate::error::VaultError;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::buffered::BufWriter;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as StorePath;
use object_store::ObjectStore;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Default number of artifacts removed concurrently
pub const DEFAULT_REMOVE_CONCURRENCY: usize = 8;

/// Storage operations the backup core depends on
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Identifiers of the artifacts directly below `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<String>, VaultError>;

    /// Download every object below `remote` into `local_dir`, returning bytes written
    async fn fetch(&self, remote: &str, local_dir: &Path) -> Result<u64, VaultError>;

    /// Upload every file below `local_dir` to `remote`, returning bytes uploaded
    async fn push(&self, local_dir: &Path, remote: &str) -> Result<u64, VaultError>;

    /// Remove every artifact in `paths`
    ///
    /// Removals are independent; when some fail the error names exactly those
    /// paths. Nothing is retried and nothing already removed is restored.
    async fn remove(&self, paths: &[String]) -> Result<(), VaultError>;
}

/// S3 connection settings
#[derive(Debug, Clone, Default)]
pub struct S3Options {
    pub bucket: String,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Custom endpoint (MinIO, Ceph, ...)
    pub endpoint: Option<String>,
}

/// [`BackupStore`] backed by any `object_store` implementation
pub struct ObjectStoreBackend {
    inner: Arc<dyn ObjectStore>,
    timeout: Option<Duration>,
    remove_concurrency: usize,
    /// Set for the local backend, whose directories outlive their objects
    local_root: Option<PathBuf>,
}

impl ObjectStoreBackend {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            timeout: None,
            remove_concurrency: DEFAULT_REMOVE_CONCURRENCY,
            local_root: None,
        }
    }

    /// Volatile store, used by tests and dry runs
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    /// Store rooted at a local directory (created if missing)
    pub fn local(root: &Path) -> Result<Self, VaultError> {
        std::fs::create_dir_all(root)
            .map_err(|e| VaultError::storage("open", root.display().to_string(), e))?;
        let fs = LocalFileSystem::new_with_prefix(root)
            .map_err(|e| VaultError::storage("open", root.display().to_string(), e))?;
        let mut store = Self::new(Arc::new(fs));
        store.local_root = Some(root.to_path_buf());
        Ok(store)
    }

    /// Store backed by an S3 bucket
    pub fn s3(options: &S3Options) -> Result<Self, VaultError> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&options.bucket)
            .with_region(&options.region);

        if let Some(key) = &options.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(secret) = &options.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        if let Some(endpoint) = &options.endpoint {
            builder = builder.with_endpoint(endpoint).with_allow_http(true);
        }

        let s3 = builder
            .build()
            .map_err(|e| VaultError::storage("open", format!("s3://{}", options.bucket), e))?;
        Ok(Self::new(Arc::new(s3)))
    }

    /// Bound every store call by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_remove_concurrency(mut self, concurrency: usize) -> Self {
        self.remove_concurrency = concurrency.max(1);
        self
    }

    async fn timed<T, F>(&self, op: &'static str, path: &str, fut: F) -> Result<T, VaultError>
    where
        F: Future<Output = Result<T, VaultError>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                VaultError::storage(op, path, format!("timed out after {}s", limit.as_secs()))
            })?,
            None => fut.await,
        }
    }

    async fn list_objects(&self, prefix: &StorePath, op: &'static str) -> Result<Vec<StorePath>, VaultError> {
        self.inner
            .list(Some(prefix))
            .map_ok(|meta| meta.location)
            .try_collect()
            .await
            .map_err(|e| VaultError::storage(op, prefix.to_string(), e))
    }

    async fn fetch_inner(&self, remote: &str, local_dir: &Path) -> Result<u64, VaultError> {
        let prefix = StorePath::from(remote);
        let mut written = 0u64;

        for location in self.list_objects(&prefix, "fetch").await? {
            let target = match location.prefix_match(&prefix) {
                Some(parts) => parts.fold(local_dir.to_path_buf(), |acc, part| acc.join(part.as_ref())),
                None => continue,
            };
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| VaultError::storage("fetch", parent.display().to_string(), e))?;
            }

            let mut file = tokio::fs::File::create(&target)
                .await
                .map_err(|e| VaultError::storage("fetch", target.display().to_string(), e))?;
            let mut chunks = self
                .inner
                .get(&location)
                .await
                .map_err(|e| VaultError::storage("fetch", location.to_string(), e))?
                .into_stream();

            while let Some(chunk) = chunks.next().await {
                let chunk = chunk.map_err(|e| VaultError::storage("fetch", location.to_string(), e))?;
                file.write_all(&chunk)
                    .await
                    .map_err(|e| VaultError::storage("fetch", target.display().to_string(), e))?;
                written += chunk.len() as u64;
            }
            file.flush()
                .await
                .map_err(|e| VaultError::storage("fetch", target.display().to_string(), e))?;
        }

        Ok(written)
    }

    async fn push_inner(&self, local_dir: &Path, remote: &str) -> Result<u64, VaultError> {
        let files = local_files(local_dir)?;
        let mut uploaded = 0u64;

        for (absolute, relative) in files {
            let location = relative
                .iter()
                .fold(StorePath::from(remote), |acc, part| acc.child(part.to_string_lossy().as_ref()));

            let mut source = tokio::fs::File::open(&absolute)
                .await
                .map_err(|e| VaultError::storage("push", absolute.display().to_string(), e))?;
            let mut writer = BufWriter::new(Arc::clone(&self.inner), location.clone());

            uploaded += tokio::io::copy(&mut source, &mut writer)
                .await
                .map_err(|e| VaultError::storage("push", location.to_string(), e))?;
            writer
                .shutdown()
                .await
                .map_err(|e| VaultError::storage("push", location.to_string(), e))?;
        }

        Ok(uploaded)
    }

    async fn remove_one(&self, path: &str) -> Result<(), VaultError> {
        let prefix = StorePath::from(path);
        for location in self.list_objects(&prefix, "remove").await? {
            match self.inner.delete(&location).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(VaultError::storage("remove", location.to_string(), e)),
            }
        }

        // Otherwise the emptied directory would still be listed as an artifact
        let relative = path.trim_matches('/');
        if let (Some(root), false) = (&self.local_root, relative.is_empty()) {
            let dir = root.join(relative);
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(VaultError::storage("remove", dir.display().to_string(), e)),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BackupStore for ObjectStoreBackend {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, VaultError> {
        let listing = async {
            let prefix_path = StorePath::from(prefix);
            let scope = if prefix_path.as_ref().is_empty() {
                None
            } else {
                Some(&prefix_path)
            };
            let result = self
                .inner
                .list_with_delimiter(scope)
                .await
                .map_err(|e| VaultError::storage("list", prefix, e))?;
            Ok(result
                .common_prefixes
                .into_iter()
                .map(|p| p.to_string())
                .collect())
        };
        self.timed("list", prefix, listing).await
    }

    async fn fetch(&self, remote: &str, local_dir: &Path) -> Result<u64, VaultError> {
        self.timed("fetch", remote, self.fetch_inner(remote, local_dir)).await
    }

    async fn push(&self, local_dir: &Path, remote: &str) -> Result<u64, VaultError> {
        self.timed("push", remote, self.push_inner(local_dir, remote)).await
    }

    async fn remove(&self, paths: &[String]) -> Result<(), VaultError> {
        let outcomes: Vec<(String, Result<(), VaultError>)> = stream::iter(paths.iter().cloned())
            .map(|path| async move {
                let outcome = self.timed("remove", &path, self.remove_one(&path)).await;
                (path, outcome)
            })
            .buffer_unordered(self.remove_concurrency)
            .collect()
            .await;

        let mut failed = Vec::new();
        let mut removed = 0usize;
        for (path, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    tracing::debug!(%path, "removed backup");
                    removed += 1;
                }
                Err(error) => {
                    tracing::warn!(%path, %error, "failed to remove backup");
                    failed.push(path);
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            failed.sort();
            Err(VaultError::PartialDeletionFailure { failed, removed })
        }
    }
}

/// Regular files below `root` as (absolute, relative) pairs
fn local_files(root: &Path) -> Result<Vec<(PathBuf, PathBuf)>, VaultError> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| VaultError::storage("push", root.display().to_string(), e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| VaultError::storage("push", entry.path().display().to_string(), e))?
            .to_path_buf();
        files.push((entry.path().to_path_buf(), relative));
    }
    Ok(files)
}
