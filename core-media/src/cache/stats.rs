//! Cache statistics and monitoring

use super::readiness::ReadinessState;
use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of the media cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of files tracked by the index
    pub entries: usize,

    /// Sum of indexed file sizes in bytes
    pub total_bytes: u64,

    /// Configured size limit, -1 for unlimited
    pub max_cache_size: i64,

    /// Downloads currently running
    pub in_progress: usize,

    /// Requests waiting for a download slot
    pub queued: usize,

    pub readiness: ReadinessState,
}

impl CacheStats {
    /// Cache usage as a percentage of the size limit, `None` when unlimited.
    pub fn usage_percentage(&self) -> Option<f64> {
        match self.max_cache_size {
            limit if limit < 0 => None,
            0 => Some(if self.total_bytes == 0 { 0.0 } else { 100.0 }),
            limit => Some((self.total_bytes as f64 / limit as f64) * 100.0),
        }
    }

    /// Returns true if the cache is over its size limit.
    pub fn is_over_limit(&self) -> bool {
        u64::try_from(self.max_cache_size).is_ok_and(|limit| self.total_bytes > limit)
    }

    /// Returns true if any download is running or waiting.
    pub fn is_busy(&self) -> bool {
        self.in_progress > 0 || self.queued > 0
    }
}
