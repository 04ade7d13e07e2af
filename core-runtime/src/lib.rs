//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure shared by the media cache:
//! - Logging and tracing infrastructure
//! - Event bus for cache lifecycle notifications
//!
//! ## Overview
//!
//! This crate establishes the logging conventions and event broadcasting
//! mechanism used throughout the workspace. It deliberately knows nothing about
//! caching itself; `core-media` publishes into it.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
