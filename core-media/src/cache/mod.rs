//! # Media Cache
//!
//! Disk-backed memoization of remote media files.
//!
//! ## Components
//!
//! - [`config`]: immutable tunables resolved once at startup
//! - [`path`]: URL to cache file name mapping
//! - [`index`]: ordered in-memory view of the cache directory
//! - [`readiness`]: gate deferring lookups until initialization settles
//! - [`scheduler`]: bounded, deduplicating download queue
//! - [`manager`]: the public facade tying them together

pub mod config;
pub mod format;
pub mod index;
pub mod manager;
pub mod path;
pub mod readiness;
pub mod scheduler;
pub mod stats;

pub use config::{CacheDirectoryKind, MediaCacheConfig, ReturnFormat, UNLIMITED};
pub use index::{CacheEntry, CacheIndex};
pub use manager::{MediaCacheManager, MediaCacheManagerBuilder, StorageStrategy};
pub use path::ResolvedPath;
pub use readiness::{ReadinessGate, ReadinessState};
pub use scheduler::{DownloadPipeline, DownloadScheduler};
pub use stats::CacheStats;
