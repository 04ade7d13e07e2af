//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides the adapters the media cache needs on desktop:
//! - `HttpClient` using `reqwest`
//! - `FileSystemAccess` using `tokio::fs`
//! - `PlatformCapabilities` reporting native storage as available
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopPlatform, ReqwestHttpClient, TokioFileSystem};
//! use core_media::{MediaCacheConfig, MediaCacheManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = MediaCacheManager::builder(MediaCacheConfig::default())
//!         .file_system(Arc::new(TokioFileSystem::new()))
//!         .http_client(Arc::new(ReqwestHttpClient::new()?))
//!         .platform(Arc::new(DesktopPlatform::new()))
//!         .build()?;
//!     manager.initialize().await;
//!     Ok(())
//! }
//! ```

mod filesystem;
mod http;
mod platform;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use platform::DesktopPlatform;
