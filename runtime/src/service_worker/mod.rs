//! Service Worker Module
//!
//! Implements the storefront's offline caching worker: versioned cache
//! lifecycle, request classification, cache-first retrieval with offline
//! fallbacks, and the command channel the page uses to steer it.

mod cache;
mod classifier;
mod config;
mod control;
mod error;
mod events;
mod fetch;
mod lifecycle;
mod manager;
mod network;
mod notification;
mod registration;
mod sync;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::*;
pub use classifier::*;
pub use config::*;
pub use control::*;
pub use error::*;
pub use events::*;
pub use fetch::*;
pub use lifecycle::*;
pub use manager::*;
pub use network::*;
pub use notification::*;
pub use registration::*;
pub use sync::*;

use std::sync::atomic::{AtomicU64, Ordering};

/// Service Worker global ID counter
static NEXT_SW_ID: AtomicU64 = AtomicU64::new(1);

/// Service Worker ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceWorkerId(u64);

impl ServiceWorkerId {
    /// Create a new unique ID
    pub fn new() -> Self {
        Self(NEXT_SW_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Get raw value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ServiceWorkerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Service Worker scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope(String);

impl Scope {
    /// Create a new scope
    pub fn new(path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.ends_with('/') {
            path.push('/');
        }
        Self(path)
    }

    /// Default scope for a script: the directory it is served from
    pub fn for_script(script_url: &str) -> Self {
        match script_url.rfind('/') {
            Some(pos) => Self::new(&script_url[..=pos]),
            None => Self::new("/"),
        }
    }

    /// Get the path
    pub fn path(&self) -> &str {
        &self.0
    }

    /// Check if a path is within this scope
    pub fn contains(&self, path: &str) -> bool {
        path.starts_with(&self.0)
    }
}
