//! # Media Cache Manager
//!
//! Turns remote media URLs into locally cached files.
//!
//! - Lookups wait on the readiness gate until the cache directory exists and
//!   has been indexed, or until the cache has been disabled
//! - A disabled cache, and any relative URL, resolves to the original URL
//! - Misses go through the [`DownloadScheduler`]: bounded concurrency and a
//!   single in-flight download per URL
//! - Files older than `max_cache_age` are dropped while indexing; the oldest
//!   files are evicted after each download while the total exceeds
//!   `max_cache_size`
//!
//! Clearing (`clear_cache`, `clear_media_cache`) takes the lifecycle lock
//! exclusively, which pauses the store step of running downloads until the
//! cache has been re-initialized.

use crate::cache::{
    config::{CacheDirectoryKind, MediaCacheConfig, ReturnFormat},
    format,
    index::{CacheEntry, CacheIndex},
    path::{self, ResolvedPath},
    readiness::{ReadinessGate, ReadinessState},
    scheduler::{DownloadPipeline, DownloadScheduler},
    stats::CacheStats,
};
use crate::error::{MediaCacheError, Result};
use async_trait::async_trait;
use bridge_traits::{
    http::{HttpClient, HttpRequest},
    platform::PlatformCapabilities,
    storage::FileSystemAccess,
    time::{Clock, SystemClock},
};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::{redact_query, strip_path};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Log at `$level` in debug mode and at `debug` otherwise.
macro_rules! diag {
    ($debug_mode:expr, $level:ident, $($arg:tt)+) => {
        if $debug_mode {
            tracing::$level!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

/// How media is served, decided once when the manager is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageStrategy {
    /// Download into the local cache directory
    Native,
    /// Hand every URL back unchanged
    Passthrough,
}

struct NativeStorage {
    fs: Arc<dyn FileSystemAccess>,
    http: Arc<dyn HttpClient>,
}

/// State shared between the facade and the download workers.
struct CacheCore {
    config: MediaCacheConfig,
    storage: Option<NativeStorage>,
    clock: Arc<dyn Clock>,
    event_bus: Option<Arc<EventBus>>,
    gate: ReadinessGate,
    index: Mutex<CacheIndex>,
    cache_dir: Mutex<Option<PathBuf>>,
    lifecycle: RwLock<()>,
}

impl CacheCore {
    fn debug_mode(&self) -> bool {
        self.config.debug_mode
    }

    fn storage(&self) -> Result<&NativeStorage> {
        self.storage.as_ref().ok_or_else(|| {
            MediaCacheError::CacheDisabled("no native storage on this platform".to_string())
        })
    }

    fn cache_dir(&self) -> Result<PathBuf> {
        self.cache_dir.lock().clone().ok_or_else(|| {
            MediaCacheError::CacheDisabled("cache directory is not available".to_string())
        })
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            // No subscribers is fine
            let _ = bus.emit(CoreEvent::Cache(event));
        }
    }

    fn set_state(&self, state: ReadinessState) {
        if self.gate.set(state) {
            debug!(state = %state, "Cache readiness changed");
            self.emit(CacheEvent::ReadinessChanged {
                state: state.to_string(),
            });
        }
    }

    /// Create the cache directory and index it, then settle the gate.
    ///
    /// Must run with the lifecycle lock held for writing.
    async fn init_storage(&self) -> ReadinessState {
        let Some(storage) = self.storage.as_ref() else {
            diag!(
                self.debug_mode(),
                warn,
                "No native storage available, media will be loaded from the original URLs"
            );
            self.set_state(ReadinessState::Disabled);
            return ReadinessState::Disabled;
        };

        match self.prepare_directory(storage).await {
            Ok(dir) => {
                *self.cache_dir.lock() = Some(dir.clone());
                self.index_cache(storage, &dir).await;
                diag!(self.debug_mode(), info, "The cache system is ready and running");
                self.set_state(ReadinessState::Ready);
                ReadinessState::Ready
            }
            Err(e) => {
                *self.cache_dir.lock() = None;
                self.index.lock().clear();
                diag!(self.debug_mode(), error, error = %e, "Cache directory setup failed");
                diag!(
                    self.debug_mode(),
                    warn,
                    "The cache system is not running, media will be loaded from the original URLs"
                );
                self.set_state(ReadinessState::Disabled);
                ReadinessState::Disabled
            }
        }
    }

    async fn prepare_directory(&self, storage: &NativeStorage) -> Result<PathBuf> {
        let init_error = |e: bridge_traits::BridgeError| {
            MediaCacheError::DirectoryInitFailure(e.to_string())
        };

        let base = match self.config.directory_kind {
            CacheDirectoryKind::Data => storage.fs.get_data_directory().await,
            CacheDirectoryKind::Cache => storage.fs.get_cache_directory().await,
        }
        .map_err(init_error)?;

        let dir = base.join(&self.config.cache_directory_name);
        if !storage.fs.exists(&dir).await.map_err(init_error)? {
            storage.fs.create_dir_all(&dir).await.map_err(init_error)?;
            debug!(dir = %strip_path(&dir.to_string_lossy()), "Created cache directory");
        }

        Ok(dir)
    }

    /// Rebuild the index from disk, deleting files past the age limit.
    ///
    /// Skipped when neither limit is set. A listing failure leaves the index
    /// empty; a file that cannot be inspected is left out.
    async fn index_cache(&self, storage: &NativeStorage, dir: &Path) {
        if !self.config.should_index() {
            self.index.lock().clear();
            return;
        }

        let files = match storage.fs.list_directory(dir).await {
            Ok(files) => files,
            Err(e) => {
                diag!(self.debug_mode(), error, error = %e, "Failed to list cache directory");
                self.index.lock().clear();
                return;
            }
        };

        let now = self.clock.now();
        let max_age = self.config.age_limit();
        let mut entries = Vec::with_capacity(files.len());

        for file in files {
            let Some(name) = file.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
                continue;
            };
            // Staging files of interrupted writes are never cache entries
            if name.starts_with('.') {
                continue;
            }

            let metadata = match storage.fs.metadata(&file).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!(file = %name, error = %e, "Skipping unreadable cache entry");
                    continue;
                }
            };
            if metadata.is_directory {
                continue;
            }

            let entry = CacheEntry::new(name, metadata.modified_at.unwrap_or(now), metadata.size);
            if entry.is_expired(now, max_age) {
                self.remove_file(storage, dir, entry, "age").await;
                continue;
            }
            entries.push(entry);
        }

        let index = CacheIndex::from_entries(entries);
        debug!(
            entries = index.len(),
            total_bytes = index.total_bytes(),
            "Indexed cache directory"
        );
        *self.index.lock() = index;
    }

    /// Delete an evicted file. Failures are logged and otherwise ignored.
    async fn remove_file(&self, storage: &NativeStorage, dir: &Path, entry: CacheEntry, reason: &str) {
        match storage.fs.delete_file(&dir.join(&entry.name)).await {
            Ok(()) => debug!(file = %entry.name, size = entry.size, reason, "Evicted cached file"),
            Err(e) => debug!(file = %entry.name, error = %e, "Failed to delete evicted file"),
        }
        self.emit(CacheEvent::MediaEvicted {
            file_name: entry.name,
            size: entry.size,
            reason: reason.to_string(),
        });
    }

    /// Evict oldest entries until the running total fits `max_cache_size`.
    async fn maintain_cache_size(&self, storage: &NativeStorage, dir: &Path) {
        let victims = self.index.lock().evict_to_fit(self.config.size_limit());
        for victim in victims {
            self.remove_file(storage, dir, victim, "size").await;
        }
    }

    /// Stat a freshly written file and add it to the index.
    async fn add_to_index(
        &self,
        storage: &NativeStorage,
        dir: &Path,
        file_name: &str,
        written: u64,
    ) -> Result<()> {
        let now = self.clock.now();
        let file = dir.join(file_name);
        let entry = match storage.fs.metadata(&file).await {
            Ok(metadata) => {
                CacheEntry::new(file_name, metadata.modified_at.unwrap_or(now), metadata.size)
            }
            Err(e) => {
                debug!(file = %file_name, error = %e, "Stat failed, indexing with written size");
                CacheEntry::new(file_name, now, written)
            }
        };

        if entry.is_expired(now, self.config.age_limit()) {
            self.remove_file(storage, dir, entry, "age").await;
            return Err(MediaCacheError::FilesystemFailure(format!(
                "{} is older than max_cache_age",
                file_name
            )));
        }

        self.index.lock().insert(entry);
        Ok(())
    }

    async fn lookup_exists(&self, storage: &NativeStorage, file_name: &str) -> Result<bool> {
        let file = self.cache_dir()?.join(file_name);
        Ok(storage.fs.exists(&file).await?)
    }

    /// Cached value for `file_name`, or `None` if the file is absent.
    async fn lookup(&self, storage: &NativeStorage, file_name: &str) -> Result<Option<String>> {
        if !self.lookup_exists(storage, file_name).await? {
            return Ok(None);
        }
        let file = self.cache_dir()?.join(file_name);
        self.format(storage, &file, file_name).await.map(Some)
    }

    async fn format(&self, storage: &NativeStorage, file: &Path, file_name: &str) -> Result<String> {
        match self.config.return_format {
            ReturnFormat::Uri => format::file_uri(file),
            ReturnFormat::Base64 => {
                let contents = storage.fs.read_file(file).await?;
                Ok(format::data_url(file_name, &contents))
            }
        }
    }

    /// Fetch, store, index and format one URL.
    async fn fetch_and_store(&self, url: &str) -> Result<String> {
        let storage = self.storage()?;
        let file_name = path::file_name_for(url, &self.config.fallback_extension);

        // A request queued behind an earlier download of the same URL
        {
            let _guard = self.lifecycle.read().await;
            if self.gate.state() == ReadinessState::Ready {
                if let Ok(Some(cached)) = self.lookup(storage, &file_name).await {
                    return Ok(cached);
                }
            }
        }

        let request = HttpRequest::get(url).headers(&self.config.http_headers);
        let body = storage
            .http
            .fetch(request)
            .await
            .map_err(MediaCacheError::fetch)?;

        let _guard = self.lifecycle.read().await;
        if self.gate.state() != ReadinessState::Ready {
            return Err(MediaCacheError::CacheDisabled(
                "cache was disabled while downloading".to_string(),
            ));
        }

        let dir = self.cache_dir()?;
        let file = dir.join(&file_name);
        let size = body.len() as u64;
        storage.fs.write_file(&file, body).await.map_err(|e| {
            MediaCacheError::FilesystemFailure(format!("Failed to write {}: {}", file_name, e))
        })?;

        if self.index.lock().exceeds(self.config.size_limit()) {
            self.maintain_cache_size(storage, &dir).await;
        }
        self.add_to_index(storage, &dir, &file_name, size).await?;

        let formatted = self.format(storage, &file, &file_name).await?;
        self.emit(CacheEvent::MediaCached {
            url: url.to_string(),
            file_name: file_name.clone(),
            size,
        });

        self.maintain_cache_size(storage, &dir).await;
        Ok(formatted)
    }
}

#[async_trait]
impl DownloadPipeline for CacheCore {
    async fn download(&self, url: &str) -> Result<String> {
        let result = self.fetch_and_store(url).await;
        if let Err(e) = &result {
            diag!(
                self.debug_mode(),
                warn,
                url = %redact_query(url),
                error = %e,
                "Media download failed"
            );
            self.emit(CacheEvent::DownloadFailed {
                url: url.to_string(),
                message: e.to_string(),
            });
        }
        result
    }
}

/// Disk-backed media cache.
///
/// Cheap to clone; clones share the same cache.
///
/// # Example
///
/// ```rust,ignore
/// use core_media::{MediaCacheConfig, MediaCacheManager};
/// use std::sync::Arc;
///
/// let manager = MediaCacheManager::builder(MediaCacheConfig::default())
///     .file_system(Arc::new(filesystem))
///     .http_client(Arc::new(http_client))
///     .platform(Arc::new(platform))
///     .build()?;
///
/// manager.start();
/// let src = manager.get_media_or_original("https://cdn.example.com/cover.jpg").await?;
/// ```
#[derive(Clone)]
pub struct MediaCacheManager {
    core: Arc<CacheCore>,
    scheduler: Arc<DownloadScheduler>,
}

impl MediaCacheManager {
    pub fn builder(config: MediaCacheConfig) -> MediaCacheManagerBuilder {
        MediaCacheManagerBuilder::new(config)
    }

    pub fn config(&self) -> &MediaCacheConfig {
        &self.core.config
    }

    pub fn strategy(&self) -> StorageStrategy {
        if self.core.storage.is_some() {
            StorageStrategy::Native
        } else {
            StorageStrategy::Passthrough
        }
    }

    pub fn readiness(&self) -> ReadinessState {
        self.core.gate.state()
    }

    /// Create the cache directory and index it.
    ///
    /// Runs once; later calls wait for the first to settle. Returns the
    /// settled state.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> ReadinessState {
        {
            let _guard = self.core.lifecycle.write().await;
            if self.core.gate.state() == ReadinessState::Uninitialized {
                self.core.set_state(ReadinessState::Initializing);
                self.core.init_storage().await;
            }
        }
        self.core.gate.wait_settled().await
    }

    /// Spawn [`initialize`](Self::initialize) on the current tokio runtime.
    ///
    /// Without a runtime nothing is spawned and the first lookup initializes
    /// the cache instead.
    pub fn start(&self) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let manager = self.clone();
                handle.spawn(async move {
                    manager.initialize().await;
                });
            }
            Err(_) => debug!("No tokio runtime, cache initializes on first lookup"),
        }
    }

    async fn settle(&self) -> ReadinessState {
        match self.core.gate.state() {
            ReadinessState::Uninitialized => self.initialize().await,
            state if state.is_settled() => state,
            _ => self.core.gate.wait_settled().await,
        }
    }

    /// Resolve `url` to a locally usable value.
    ///
    /// Returns the cached file as a `file://` URL or a data URL depending on
    /// `return_format`, downloading it first on a miss. A disabled cache
    /// resolves to `url` itself. Relative URLs are returned right away,
    /// without waiting for or starting initialization.
    ///
    /// # Errors
    ///
    /// - [`MediaCacheError::InvalidInput`] for an empty URL
    /// - [`MediaCacheError::FetchFailure`] / [`MediaCacheError::FilesystemFailure`]
    ///   when the download fails
    #[instrument(skip(self, url), fields(url = %redact_query(url)))]
    pub async fn get_media(&self, url: &str) -> Result<String> {
        if url.is_empty() {
            return Err(MediaCacheError::InvalidInput(
                "media url is empty".to_string(),
            ));
        }

        let ResolvedPath::Cacheable { file_name } =
            path::resolve(url, &self.core.config.fallback_extension)
        else {
            return Ok(url.to_string());
        };

        loop {
            if self.settle().await == ReadinessState::Disabled {
                return Ok(url.to_string());
            }

            let storage = self.core.storage()?;
            let guard = self.core.lifecycle.read().await;
            if self.core.gate.state() != ReadinessState::Ready {
                // Cleared between settling and taking the lock
                drop(guard);
                continue;
            }

            let cached = self.core.lookup(storage, &file_name).await;
            drop(guard);

            match cached {
                Ok(Some(value)) => {
                    debug!(file = %file_name, "Cache hit");
                    return Ok(value);
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(file = %file_name, error = %e, "Cache lookup failed, downloading");
                    break;
                }
            }
        }

        debug!(file = %file_name, "Cache miss");
        match self.scheduler.request(url).await {
            // Disabled by a clear that ran while downloading
            Err(MediaCacheError::CacheDisabled(_)) => Ok(url.to_string()),
            result => result,
        }
    }

    /// Like [`get_media`](Self::get_media) but every recoverable failure
    /// resolves to the original URL.
    pub async fn get_media_or_original(&self, url: &str) -> Result<String> {
        match self.get_media(url).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_fallback_safe() => {
                diag!(
                    self.core.debug_mode(),
                    warn,
                    url = %redact_query(url),
                    error = %e,
                    "Falling back to original URL"
                );
                Ok(url.to_string())
            }
            Err(e) => Err(e),
        }
    }

    /// Warm the cache for `url`. Same outcome as [`get_media`](Self::get_media).
    pub async fn preload(&self, url: &str) -> Result<String> {
        self.get_media(url).await
    }

    /// Whether `url` currently has a cached file.
    ///
    /// Never waits on the gate; false unless the cache is ready.
    pub async fn is_cached(&self, url: &str) -> bool {
        if self.core.gate.state() != ReadinessState::Ready {
            return false;
        }
        let Some(storage) = self.core.storage.as_ref() else {
            return false;
        };
        let Some(file_name) = path::resolve(url, &self.core.config.fallback_extension)
            .file_name()
            .map(str::to_owned)
        else {
            return false;
        };

        matches!(self.core.lookup_exists(storage, &file_name).await, Ok(true))
    }

    pub fn stats(&self) -> CacheStats {
        let (entries, total_bytes) = {
            let index = self.core.index.lock();
            (index.len(), index.total_bytes())
        };

        CacheStats {
            entries,
            total_bytes,
            max_cache_size: self.core.config.max_cache_size,
            in_progress: self.scheduler.in_progress(),
            queued: self.scheduler.queued(),
            readiness: self.readiness(),
        }
    }

    /// Delete the whole cache directory and re-initialize.
    ///
    /// Downloads finishing meanwhile wait and then store into the new
    /// directory. A removal error is returned after re-initialization.
    #[instrument(skip(self))]
    pub async fn clear_cache(&self) -> Result<()> {
        self.settle().await;
        let Some(storage) = self.core.storage.as_ref() else {
            return Ok(());
        };

        let _guard = self.core.lifecycle.write().await;
        self.core.set_state(ReadinessState::Initializing);

        let dir = self.core.cache_dir.lock().take();
        let removal = match dir {
            Some(dir) => match storage.fs.delete_dir_all(&dir).await {
                Err(e) if !e.is_not_found() => Err(MediaCacheError::FilesystemFailure(format!(
                    "Failed to remove cache directory: {}",
                    e
                ))),
                _ => Ok(()),
            },
            None => Ok(()),
        };
        self.core.index.lock().clear();

        let state = self.core.init_storage().await;
        diag!(self.core.debug_mode(), info, state = %state, "Cache cleared");
        self.core.emit(CacheEvent::CacheCleared {
            scope: "all".to_string(),
        });

        if let Err(e) = &removal {
            diag!(self.core.debug_mode(), error, error = %e, "Cache clear was incomplete");
        }
        removal
    }

    /// Delete the cached file for `url` and re-initialize.
    #[instrument(skip(self, url), fields(url = %redact_query(url)))]
    pub async fn clear_media_cache(&self, url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(MediaCacheError::InvalidInput(
                "media url is empty".to_string(),
            ));
        }

        self.settle().await;
        let Some(storage) = self.core.storage.as_ref() else {
            return Ok(());
        };
        let ResolvedPath::Cacheable { file_name } =
            path::resolve(url, &self.core.config.fallback_extension)
        else {
            return Ok(());
        };

        let _guard = self.core.lifecycle.write().await;
        self.core.set_state(ReadinessState::Initializing);

        let dir = self.core.cache_dir.lock().clone();
        let removal = match dir {
            Some(dir) => match storage.fs.delete_file(&dir.join(&file_name)).await {
                Err(e) if !e.is_not_found() => Err(MediaCacheError::FilesystemFailure(format!(
                    "Failed to remove {}: {}",
                    file_name, e
                ))),
                _ => Ok(()),
            },
            None => Ok(()),
        };
        self.core.index.lock().remove(&file_name);

        self.core.init_storage().await;
        self.core.emit(CacheEvent::CacheCleared {
            scope: url.to_string(),
        });

        removal
    }
}

/// Builder for [`MediaCacheManager`].
///
/// The file system and HTTP client are optional: without either one the
/// manager runs in [`StorageStrategy::Passthrough`].
pub struct MediaCacheManagerBuilder {
    config: MediaCacheConfig,
    fs: Option<Arc<dyn FileSystemAccess>>,
    http: Option<Arc<dyn HttpClient>>,
    platform: Option<Arc<dyn PlatformCapabilities>>,
    clock: Option<Arc<dyn Clock>>,
    event_bus: Option<Arc<EventBus>>,
}

impl MediaCacheManagerBuilder {
    pub fn new(config: MediaCacheConfig) -> Self {
        Self {
            config,
            fs: None,
            http: None,
            platform: None,
            clock: None,
            event_bus: None,
        }
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.fs = Some(fs);
        self
    }

    pub fn http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Platform whose `has_native_storage` decides the strategy.
    pub fn platform(mut self, platform: Arc<dyn PlatformCapabilities>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Time source for age checks (default: system clock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Bus receiving [`CacheEvent`]s.
    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Validate the configuration and select the storage strategy.
    pub fn build(self) -> Result<MediaCacheManager> {
        self.config.validate()?;

        let native_platform = self
            .platform
            .as_ref()
            .map_or(true, |platform| platform.has_native_storage());

        let storage = match (native_platform, self.fs, self.http) {
            (true, Some(fs), Some(http)) => Some(NativeStorage { fs, http }),
            _ => None,
        };

        if storage.is_none() {
            diag!(
                self.config.debug_mode,
                warn,
                platform = ?self.platform.as_ref().map(|p| p.platform_name().to_string()),
                "Media cache runs in passthrough mode"
            );
        }

        let concurrency = self.config.concurrency;
        let core = Arc::new(CacheCore {
            config: self.config,
            storage,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_bus: self.event_bus,
            gate: ReadinessGate::new(),
            index: Mutex::new(CacheIndex::new()),
            cache_dir: Mutex::new(None),
            lifecycle: RwLock::new(()),
        });

        let pipeline: Arc<dyn DownloadPipeline> = core.clone();
        let scheduler = Arc::new(DownloadScheduler::new(pipeline, concurrency));

        Ok(MediaCacheManager { core, scheduler })
    }
}
