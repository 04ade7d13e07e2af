//! `FileSystemAccess` over `tokio::fs`.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{FileMetadata, FileSystemAccess},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, trace};

const APP_DIRECTORY: &str = "media-cache-core";

/// Desktop file system rooted in the per-user directories reported by `dirs`.
///
/// Base directories are created on first use. Writes go through a sibling
/// temporary file and a rename, so a reader never observes a half-written
/// cached file.
pub struct TokioFileSystem {
    cache_dir: PathBuf,
    data_dir: PathBuf,
}

impl TokioFileSystem {
    pub fn new() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIRECTORY);

        let data_dir = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIRECTORY);

        Self::with_directories(cache_dir, data_dir)
    }

    pub fn with_directories(cache_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self { cache_dir, data_dir }
    }

    /// `<root>/cache` and `<root>/data`. Handy for tests and portable installs.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self::with_directories(root.join("cache"), root.join("data"))
    }

    async fn ensure_base(dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).await.map_err(BridgeError::Io)?;
        Ok(dir.to_path_buf())
    }

    fn staging_path(path: &Path) -> PathBuf {
        let mut name = OsString::from(".");
        name.push(path.file_name().unwrap_or_default());
        name.push(".tmp");
        path.with_file_name(name)
    }
}

impl Default for TokioFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn get_cache_directory(&self) -> Result<PathBuf> {
        Self::ensure_base(&self.cache_dir).await
    }

    async fn get_data_directory(&self) -> Result<PathBuf> {
        Self::ensure_base(&self.data_dir).await
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(path).await.map_err(BridgeError::Io)
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let metadata = fs::metadata(path).await?;

        Ok(FileMetadata {
            size: metadata.len(),
            created_at: metadata.created().ok().map(DateTime::<Utc>::from),
            modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
            is_directory: metadata.is_dir(),
        })
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await?;
        debug!(path = ?path, "Created directory");
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let data = fs::read(path).await?;
        trace!(path = ?path, size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        let staging = Self::staging_path(path);
        let stored = match fs::write(&staging, &data).await {
            Ok(()) => fs::rename(&staging, path).await,
            Err(e) => Err(e),
        };

        if let Err(e) = stored {
            // Best effort, the write or rename error is the one worth reporting
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }

        trace!(path = ?path, size = data.len(), "Wrote file");
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).await?;
        trace!(path = ?path, "Deleted file");
        Ok(())
    }

    async fn delete_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).await?;
        debug!(path = ?path, "Deleted directory");
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut read_dir = fs::read_dir(path).await?;
        let mut entries = Vec::new();

        while let Some(entry) = read_dir.next_entry().await? {
            entries.push(entry.path());
        }

        trace!(path = ?path, count = entries.len(), "Listed directory");
        Ok(entries)
    }
}
