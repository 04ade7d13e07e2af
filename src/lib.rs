//! Workspace facade crate.
//!
//! Re-exports the media cache together with the bridge traits it consumes so a
//! host application can depend on `media-cache-workspace` alone. With the
//! `desktop-shims` feature (default) the desktop bridge adapters are exposed as
//! well, which is enough to run the cache on macOS, Windows and Linux.

pub use bridge_traits;
pub use core_media;
pub use core_runtime;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;

use thiserror::Error;

/// Failure while wiring a media cache to host adapters.
#[derive(Error, Debug)]
pub enum SetupError {
    /// A bridge adapter could not be created.
    #[error(transparent)]
    Bridge(#[from] bridge_traits::BridgeError),

    /// The cache rejected its configuration.
    #[error(transparent)]
    Cache(#[from] core_media::MediaCacheError),
}

/// HTTP client used by [`desktop_media_cache`].
///
/// A failed media fetch is reported to the caller as is, so the client makes
/// a single attempt per request.
#[cfg(feature = "desktop-shims")]
pub fn desktop_http_client() -> Result<bridge_desktop::ReqwestHttpClient, SetupError> {
    use bridge_traits::RetryPolicy;

    Ok(bridge_desktop::ReqwestHttpClient::new()?.with_retry_policy(RetryPolicy::no_retry()))
}

/// Builds a media cache wired to the desktop bridge adapters.
///
/// Initialization is spawned on the current tokio runtime, so this must be
/// called from within one. Lookups issued before initialization finishes wait
/// on the readiness gate.
#[cfg(feature = "desktop-shims")]
pub fn desktop_media_cache(
    config: core_media::MediaCacheConfig,
) -> Result<core_media::MediaCacheManager, SetupError> {
    use bridge_desktop::{DesktopPlatform, TokioFileSystem};
    use std::sync::Arc;

    let manager = core_media::MediaCacheManager::builder(config)
        .file_system(Arc::new(TokioFileSystem::new()))
        .http_client(Arc::new(desktop_http_client()?))
        .platform(Arc::new(DesktopPlatform::new()))
        .build()?;

    manager.start();
    Ok(manager)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::BridgeError;
    use core_media::MediaCacheError;

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_desktop_http_client_does_not_retry() {
        let client = desktop_http_client().unwrap();
        assert_eq!(client.retry_policy().max_attempts, 1);
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_invalid_config_is_a_cache_error() {
        let config = core_media::MediaCacheConfig::new().with_concurrency(0);
        assert!(matches!(
            desktop_media_cache(config),
            Err(SetupError::Cache(MediaCacheError::Config(_)))
        ));
    }

    #[test]
    fn test_bridge_failures_keep_their_source() {
        let err = SetupError::from(BridgeError::OperationFailed(
            "Failed to build HTTP client: no TLS backend".to_string(),
        ));
        assert!(matches!(err, SetupError::Bridge(BridgeError::OperationFailed(_))));
        assert_eq!(
            err.to_string(),
            "Bridge operation failed: Failed to build HTTP client: no TLS backend"
        );
    }
}
