//! File system capability consumed by the on-disk media cache.
//!
//! The cache only ever touches one flat directory under a host-provided base
//! root. Implementations must report a missing file or directory as
//! `BridgeError::Io` with [`std::io::ErrorKind::NotFound`]; clearing relies on
//! that to treat an already-removed target as success.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Size and timestamps of a directory entry.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub created_at: Option<DateTime<Utc>>,
    /// Age-based eviction measures against this; `None` counts as "now"
    pub modified_at: Option<DateTime<Utc>>,
    pub is_directory: bool,
}

impl FileMetadata {
    /// Metadata for a regular file.
    pub fn file(size: u64, modified_at: DateTime<Utc>) -> Self {
        Self {
            size,
            created_at: None,
            modified_at: Some(modified_at),
            is_directory: false,
        }
    }
}

/// Async file I/O against the host's storage.
///
/// - Desktop: `tokio::fs` under the user's data/cache directories
/// - iOS/Android: the app sandbox
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn store(fs: &dyn FileSystemAccess, name: &str, body: Bytes) -> Result<PathBuf> {
///     let dir = fs.get_data_directory().await?.join("media-cache");
///     if !fs.exists(&dir).await? {
///         fs.create_dir_all(&dir).await?;
///     }
///     let file = dir.join(name);
///     fs.write_file(&file, body).await?;
///     Ok(file)
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Base root the OS may purge under storage pressure.
    async fn get_cache_directory(&self) -> Result<PathBuf>;

    /// Base root that persists until the app is removed.
    async fn get_data_directory(&self) -> Result<PathBuf>;

    async fn exists(&self, path: &Path) -> Result<bool>;

    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create `path` and any missing parents. Succeeds if it already exists.
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Create or truncate `path` and write `data` to it.
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Remove a directory and everything below it.
    async fn delete_dir_all(&self, path: &Path) -> Result<()>;

    /// Full paths of the direct children of `path`, in no particular order.
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;
}
