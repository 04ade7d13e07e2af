//! # Media Cache Core
//!
//! Resolves remote media URLs to locally cached files.
//!
//! ## Overview
//!
//! [`MediaCacheManager`] guarantees:
//! - at most `concurrency` downloads running at once
//! - at most one download per distinct URL; concurrent callers share it
//! - a bounded on-disk footprint governed by `max_cache_age` and
//!   `max_cache_size`
//!
//! When the host has no native storage, or the cache directory cannot be
//! created, every lookup resolves to the original URL instead.
//!
//! Host capabilities (file system, HTTP, platform, clock) are injected through
//! the traits in `bridge-traits`.

pub mod cache;
pub mod error;

pub use cache::{
    CacheDirectoryKind, CacheEntry, CacheStats, MediaCacheConfig, MediaCacheManager,
    MediaCacheManagerBuilder, ReadinessState, ReturnFormat, StorageStrategy,
};
pub use error::{MediaCacheError, Result};
