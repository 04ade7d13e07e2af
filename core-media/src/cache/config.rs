//! Media cache configuration

use crate::error::{MediaCacheError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Marker for "no limit" on size and age.
pub const UNLIMITED: i64 = -1;

/// Configuration for the media cache manager.
///
/// Resolved once at construction and never mutated afterwards. Deserializes
/// from JSON with either snake_case names or the camelCase option names used
/// by hybrid-app hosts (`maxCacheSize`, `imageReturnType`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaCacheConfig {
    /// Promote cache diagnostics to info/warn/error level (default: false)
    #[serde(alias = "debugMode")]
    pub debug_mode: bool,

    /// Maximum number of fetches running at once (default: 5)
    pub concurrency: usize,

    /// Maximum total size of cached files in bytes, -1 for unlimited (default: -1)
    #[serde(alias = "maxCacheSize")]
    pub max_cache_size: i64,

    /// Maximum age of a cached file in milliseconds, -1 for unlimited (default: -1)
    #[serde(alias = "maxCacheAge")]
    pub max_cache_age: i64,

    /// Name of the cache directory under the base directory (default: "media-cache")
    #[serde(alias = "cacheDirectoryName")]
    pub cache_directory_name: String,

    /// Extension used when the URL has none (default: ".jpg")
    #[serde(alias = "fallbackFileNameCachedExtension", alias = "fallbackExtension")]
    pub fallback_extension: String,

    /// Shape of the value handed back for a cached file (default: uri)
    #[serde(alias = "imageReturnType", alias = "returnFormat")]
    pub return_format: ReturnFormat,

    /// Extra headers sent with every media fetch
    #[serde(alias = "httpHeaders")]
    pub http_headers: HashMap<String, String>,

    /// Which host directory holds the cache directory (default: data)
    #[serde(alias = "directoryKind")]
    pub directory_kind: CacheDirectoryKind,
}

impl Default for MediaCacheConfig {
    fn default() -> Self {
        Self {
            debug_mode: false,
            concurrency: 5,
            max_cache_size: UNLIMITED,
            max_cache_age: UNLIMITED,
            cache_directory_name: "media-cache".to_string(),
            fallback_extension: ".jpg".to_string(),
            return_format: ReturnFormat::Uri,
            http_headers: HashMap::new(),
            directory_kind: CacheDirectoryKind::Data,
        }
    }
}

impl MediaCacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| MediaCacheError::Config(e.to_string()))
    }

    pub fn with_debug_mode(mut self, enabled: bool) -> Self {
        self.debug_mode = enabled;
        self
    }

    /// Set maximum concurrent fetches.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set maximum cache size in bytes (-1 for unlimited).
    pub fn with_max_cache_size(mut self, bytes: i64) -> Self {
        self.max_cache_size = bytes;
        self
    }

    /// Set maximum cache age in milliseconds (-1 for unlimited).
    pub fn with_max_cache_age(mut self, millis: i64) -> Self {
        self.max_cache_age = millis;
        self
    }

    pub fn with_cache_directory_name(mut self, name: impl Into<String>) -> Self {
        self.cache_directory_name = name.into();
        self
    }

    pub fn with_fallback_extension(mut self, extension: impl Into<String>) -> Self {
        self.fallback_extension = extension.into();
        self
    }

    pub fn with_return_format(mut self, format: ReturnFormat) -> Self {
        self.return_format = format;
        self
    }

    /// Add a header sent with every fetch.
    pub fn with_http_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.http_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_directory_kind(mut self, kind: CacheDirectoryKind) -> Self {
        self.directory_kind = kind;
        self
    }

    /// Size limit in bytes, `None` when unlimited.
    pub fn size_limit(&self) -> Option<u64> {
        u64::try_from(self.max_cache_size).ok()
    }

    /// Age limit in milliseconds, `None` when unlimited.
    pub fn age_limit(&self) -> Option<i64> {
        (self.max_cache_age >= 0).then_some(self.max_cache_age)
    }

    /// Whether the on-disk cache has to be indexed at startup.
    pub fn should_index(&self) -> bool {
        self.size_limit().is_some() || self.age_limit().is_some()
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(MediaCacheError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }

        if self.max_cache_size < UNLIMITED {
            return Err(MediaCacheError::Config(format!(
                "max_cache_size must be -1 or non-negative, got {}",
                self.max_cache_size
            )));
        }

        if self.max_cache_age < UNLIMITED {
            return Err(MediaCacheError::Config(format!(
                "max_cache_age must be -1 or non-negative, got {}",
                self.max_cache_age
            )));
        }

        let name = self.cache_directory_name.as_str();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(MediaCacheError::Config(format!(
                "cache_directory_name must be a single directory name, got {:?}",
                name
            )));
        }

        if self.fallback_extension.is_empty() {
            return Err(MediaCacheError::Config(
                "fallback_extension cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// What `get_media` hands back for a cached file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnFormat {
    /// `file://` URL of the cached file
    #[default]
    Uri,
    /// `data:<mime>;base64,<payload>` URL with the file contents
    Base64,
}

/// Host directory under which the cache directory is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheDirectoryKind {
    /// Persistent application data directory
    #[default]
    Data,
    /// Purgeable cache directory
    Cache,
}
