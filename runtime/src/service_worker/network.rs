//! Network access
//!
//! The worker's view of the platform's real `fetch`.

use async_trait::async_trait;

use super::{NetworkError, Request, Response};

/// Platform network
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform a real network fetch.
    ///
    /// `Err` means no response could be obtained at all (offline, DNS,
    /// connection reset). HTTP error statuses are `Ok` responses.
    async fn fetch(&self, request: Request) -> Result<Response, NetworkError>;
}
