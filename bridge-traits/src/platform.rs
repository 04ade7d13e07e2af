//! Platform capability detection.
//!
//! The media cache asks the host once, at construction, whether it may use
//! native storage. Browsers and live-reload shells answer `false`; the cache then
//! serves every URL unchanged instead of caching it.

/// Capabilities reported by the host platform.
pub trait PlatformCapabilities: Send + Sync {
    /// Short platform identifier used in logs (e.g. `"desktop"`, `"web"`).
    fn platform_name(&self) -> &str;

    /// Whether a persistent, writable filesystem is available to the cache.
    fn has_native_storage(&self) -> bool;
}

/// Fixed capability answer, for hosts that know their environment up front.
#[derive(Debug, Clone)]
pub struct StaticPlatform {
    name: String,
    native_storage: bool,
}

impl StaticPlatform {
    pub fn new(name: impl Into<String>, native_storage: bool) -> Self {
        Self {
            name: name.into(),
            native_storage,
        }
    }

    /// A platform with native storage.
    pub fn native(name: impl Into<String>) -> Self {
        Self::new(name, true)
    }

    /// A browser-like platform without native storage.
    pub fn web() -> Self {
        Self::new("web", false)
    }
}

impl PlatformCapabilities for StaticPlatform {
    fn platform_name(&self) -> &str {
        &self.name
    }

    fn has_native_storage(&self) -> bool {
        self.native_storage
    }
}
