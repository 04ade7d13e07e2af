//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpRequest, HttpResponse},
    platform::PlatformCapabilities,
    storage::{FileMetadata, FileSystemAccess},
    time::{Clock, ManualClock},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_media::cache::path::file_name_for;
use core_media::{MediaCacheConfig, MediaCacheManager};
use core_runtime::events::{CoreEvent, EventBus};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use tokio::sync::Semaphore;

pub const ROOT: &str = "/app";

pub fn data_dir() -> PathBuf {
    Path::new(ROOT).join("data")
}

pub fn cache_dir() -> PathBuf {
    data_dir().join("media-cache")
}

pub fn cached_path(url: &str) -> PathBuf {
    cache_dir().join(file_name_for(url, ".jpg"))
}

pub fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn io_error(kind: ErrorKind, path: &Path) -> BridgeError {
    BridgeError::Io(std::io::Error::new(kind, path.display().to_string()))
}

/// File system kept in memory. Modification times come from the shared clock.
pub struct InMemoryFileSystem {
    clock: Arc<ManualClock>,
    files: Mutex<BTreeMap<PathBuf, (Bytes, DateTime<Utc>)>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
    ops: Mutex<Vec<String>>,
    pub fail_create_dir: AtomicBool,
    pub fail_list: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl InMemoryFileSystem {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        let dirs = [PathBuf::from(ROOT), data_dir(), Path::new(ROOT).join("cache")]
            .into_iter()
            .collect();
        Self {
            clock,
            files: Mutex::new(BTreeMap::new()),
            dirs: Mutex::new(dirs),
            ops: Mutex::new(Vec::new()),
            fail_create_dir: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    fn record(&self, op: &str, path: &Path) {
        self.ops.lock().push(format!("{} {}", op, path.display()));
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().clone()
    }

    pub fn op_count(&self) -> usize {
        self.ops.lock().len()
    }

    /// Put a file on "disk" without going through the trait.
    pub fn seed_file(&self, path: impl Into<PathBuf>, size: usize, modified_at: DateTime<Utc>) {
        let path = path.into();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.files
            .lock()
            .insert(path, (Bytes::from(vec![b'x'; size]), modified_at));
    }

    pub fn has_file(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }

    pub fn has_dir(&self, path: &Path) -> bool {
        self.dirs.lock().contains(path)
    }

    pub fn file_names_in(&self, dir: &Path) -> Vec<String> {
        self.files
            .lock()
            .keys()
            .filter(|path| path.parent() == Some(dir))
            .filter_map(|path| path.file_name()?.to_str().map(str::to_owned))
            .collect()
    }

    fn add_dir(&self, path: &Path) {
        let mut dirs = self.dirs.lock();
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            dirs.insert(ancestor.to_path_buf());
        }
    }
}

#[async_trait]
impl FileSystemAccess for InMemoryFileSystem {
    async fn get_cache_directory(&self) -> Result<PathBuf> {
        Ok(Path::new(ROOT).join("cache"))
    }

    async fn get_data_directory(&self) -> Result<PathBuf> {
        Ok(data_dir())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.record("exists", path);
        Ok(self.files.lock().contains_key(path) || self.dirs.lock().contains(path))
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        self.record("metadata", path);
        if let Some((data, modified_at)) = self.files.lock().get(path) {
            return Ok(FileMetadata {
                size: data.len() as u64,
                created_at: Some(*modified_at),
                modified_at: Some(*modified_at),
                is_directory: false,
            });
        }
        if self.dirs.lock().contains(path) {
            return Ok(FileMetadata {
                size: 0,
                created_at: None,
                modified_at: None,
                is_directory: true,
            });
        }
        Err(io_error(ErrorKind::NotFound, path))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.record("create_dir_all", path);
        if self.fail_create_dir.load(Ordering::SeqCst) {
            return Err(io_error(ErrorKind::PermissionDenied, path));
        }
        self.add_dir(path);
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        self.record("read_file", path);
        self.files
            .lock()
            .get(path)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| io_error(ErrorKind::NotFound, path))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        self.record("write_file", path);
        let parent_exists = path
            .parent()
            .is_some_and(|parent| self.dirs.lock().contains(parent));
        if !parent_exists {
            return Err(io_error(ErrorKind::NotFound, path));
        }
        self.files
            .lock()
            .insert(path.to_path_buf(), (data, self.clock.now()));
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        self.record("delete_file", path);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(io_error(ErrorKind::PermissionDenied, path));
        }
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io_error(ErrorKind::NotFound, path))
    }

    async fn delete_dir_all(&self, path: &Path) -> Result<()> {
        self.record("delete_dir_all", path);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(io_error(ErrorKind::PermissionDenied, path));
        }
        if !self.dirs.lock().remove(path) {
            return Err(io_error(ErrorKind::NotFound, path));
        }
        self.dirs.lock().retain(|dir| !dir.starts_with(path));
        self.files.lock().retain(|file, _| !file.starts_with(path));
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.record("list_directory", path);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(io_error(ErrorKind::PermissionDenied, path));
        }
        if !self.dirs.lock().contains(path) {
            return Err(io_error(ErrorKind::NotFound, path));
        }

        let mut entries: Vec<PathBuf> = self
            .files
            .lock()
            .keys()
            .filter(|file| file.parent() == Some(path))
            .cloned()
            .collect();
        entries.extend(
            self.dirs
                .lock()
                .iter()
                .filter(|dir| dir.parent() == Some(path))
                .cloned(),
        );
        Ok(entries)
    }
}

/// HTTP client serving canned bodies.
///
/// Unknown URLs get a 200 response of `default_body_size` bytes. When gated,
/// each request blocks until a permit is released with [`release`](Self::release).
pub struct ScriptedHttpClient {
    default_body_size: usize,
    responses: Mutex<HashMap<String, (u16, Bytes)>>,
    requests: Mutex<Vec<HttpRequest>>,
    running: AtomicUsize,
    peak: AtomicUsize,
    gate: Option<Semaphore>,
}

impl ScriptedHttpClient {
    pub fn new(default_body_size: usize) -> Self {
        Self {
            default_body_size,
            responses: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn respond(self, url: &str, status: u16, body: impl Into<Bytes>) -> Self {
        self.responses
            .lock()
            .insert(url.to_string(), (status, body.into()));
        self
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn fetches(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.url.clone()).collect()
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.url == url).count()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.clone();
        self.requests.lock().push(request);

        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        let (status, body) = self
            .responses
            .lock()
            .get(&url)
            .cloned()
            .unwrap_or_else(|| (200, Bytes::from(vec![b'x'; self.default_body_size])));

        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body,
        })
    }
}

pub struct NoNativeStorage;

impl PlatformCapabilities for NoNativeStorage {
    fn platform_name(&self) -> &str {
        "browser"
    }

    fn has_native_storage(&self) -> bool {
        false
    }
}

/// Manager wired to in-memory doubles.
pub struct Harness {
    pub manager: MediaCacheManager,
    pub fs: Arc<InMemoryFileSystem>,
    pub http: Arc<ScriptedHttpClient>,
    pub clock: Arc<ManualClock>,
    pub events: Receiver<CoreEvent>,
}

impl Harness {
    pub fn new(config: MediaCacheConfig, http: ScriptedHttpClient) -> Self {
        let clock = Arc::new(ManualClock::default());
        let fs = Arc::new(InMemoryFileSystem::new(clock.clone()));
        Self::with_fs(config, http, clock, fs)
    }

    pub fn with_fs(
        config: MediaCacheConfig,
        http: ScriptedHttpClient,
        clock: Arc<ManualClock>,
        fs: Arc<InMemoryFileSystem>,
    ) -> Self {
        let http = Arc::new(http);
        let bus = Arc::new(EventBus::new(256));
        let events = bus.subscribe();

        let manager = MediaCacheManager::builder(config)
            .file_system(fs.clone())
            .http_client(http.clone())
            .clock(clock.clone())
            .event_bus(bus)
            .build()
            .expect("valid test config");

        Self {
            manager,
            fs,
            http,
            clock,
            events,
        }
    }

    /// Events received so far.
    pub fn drain_events(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Let spawned tasks run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(25)).await;
}
