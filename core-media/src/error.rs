//! # Media Cache Error Types
//!
//! Errors are `Clone` because one fetch outcome is delivered to every caller
//! waiting on the same URL.

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors that can occur while resolving media through the cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaCacheError {
    /// The URL was empty or otherwise unusable.
    #[error("The media url provided was empty or invalid: {0}")]
    InvalidInput(String),

    /// The cache is not running; the original URL should be used instead.
    #[error("Media cache is disabled: {0}")]
    CacheDisabled(String),

    /// The transport failed or returned a non-2xx status.
    #[error("Failed to fetch media: {0}")]
    FetchFailure(String),

    /// Writing, reading, listing or deleting a cached file failed.
    #[error("Filesystem operation failed: {0}")]
    FilesystemFailure(String),

    /// The cache directory could not be located or created.
    #[error("Failed to initialize cache directory: {0}")]
    DirectoryInitFailure(String),

    /// The configuration was rejected by validation.
    #[error("Invalid media cache configuration: {0}")]
    Config(String),
}

impl MediaCacheError {
    /// Whether a caller can recover by displaying the original URL.
    ///
    /// Everything except bad input and bad configuration qualifies.
    pub fn is_fallback_safe(&self) -> bool {
        !matches!(
            self,
            MediaCacheError::InvalidInput(_) | MediaCacheError::Config(_)
        )
    }

    pub(crate) fn fetch(error: BridgeError) -> Self {
        MediaCacheError::FetchFailure(error.to_string())
    }
}

impl From<BridgeError> for MediaCacheError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::HttpStatus { .. } => MediaCacheError::FetchFailure(error.to_string()),
            BridgeError::NotAvailable(msg) => MediaCacheError::CacheDisabled(msg),
            other => MediaCacheError::FilesystemFailure(other.to_string()),
        }
    }
}

/// Result type for media cache operations.
pub type Result<T> = std::result::Result<T, MediaCacheError>;
