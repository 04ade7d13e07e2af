//! Desktop platform capabilities.

use bridge_traits::platform::PlatformCapabilities;

/// Desktop hosts always have a writable local filesystem.
#[derive(Debug, Clone, Default)]
pub struct DesktopPlatform;

impl DesktopPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl PlatformCapabilities for DesktopPlatform {
    fn platform_name(&self) -> &str {
        std::env::consts::OS
    }

    fn has_native_storage(&self) -> bool {
        true
    }
}
