//! Readiness gate for the media cache.
//!
//! Lookups wait here until initialization has settled the cache into
//! [`ReadinessState::Ready`] or [`ReadinessState::Disabled`]. Waiting uses a
//! `tokio::sync::watch` channel, so blocked callers wake on the transition
//! itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

/// Lifecycle of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessState {
    /// Constructed, initialization not started
    Uninitialized,
    /// Creating the directory and indexing, or clearing
    Initializing,
    /// Lookups and downloads go through the cache
    Ready,
    /// Every lookup resolves to the original URL
    Disabled,
}

impl ReadinessState {
    /// `Ready` and `Disabled` are terminal until the next clear.
    pub fn is_settled(self) -> bool {
        matches!(self, ReadinessState::Ready | ReadinessState::Disabled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReadinessState::Uninitialized => "uninitialized",
            ReadinessState::Initializing => "initializing",
            ReadinessState::Ready => "ready",
            ReadinessState::Disabled => "disabled",
        }
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct ReadinessGate {
    sender: watch::Sender<ReadinessState>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(ReadinessState::Uninitialized);
        Self { sender }
    }

    pub fn state(&self) -> ReadinessState {
        *self.sender.borrow()
    }

    /// Move to `state`. Returns `false` if the gate was already there.
    pub fn set(&self, state: ReadinessState) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        })
    }

    /// Wait until the gate is `Ready` or `Disabled` and return that state.
    pub async fn wait_settled(&self) -> ReadinessState {
        let mut receiver = self.sender.subscribe();
        let settled = match receiver.wait_for(|state| state.is_settled()).await {
            Ok(state) => *state,
            // The sender lives as long as `self`, so the channel cannot close here
            Err(_) => self.state(),
        };
        settled
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}
