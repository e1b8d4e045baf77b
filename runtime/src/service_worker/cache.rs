//! Cache API Implementation
//!
//! Named response caches and the store that owns them. Caches are keyed by
//! name (`{app-prefix}-{version}`); entries are keyed by request identity
//! (method + normalised URL, query included, fragment dropped).

use std::collections::BTreeMap;

use async_trait::async_trait;
use spin::RwLock;
use url::Url;

use super::{CacheError, Request, Response, ResponseType};

/// Default store quota (50 MB)
pub const DEFAULT_QUOTA: usize = 50 * 1024 * 1024;

/// Cache key for a request
pub fn cache_key(request: &Request) -> String {
    format!("{}:{}", request.method.as_str(), normalize_url(&request.url))
}

/// Absolute URLs come back in canonical form (lowercase scheme and host,
/// default port and empty path folded). Relative URLs have no base here and
/// only lose their fragment.
pub fn normalize_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.into()
        }
        Err(_) => match url.find('#') {
            Some(pos) => url[..pos].to_string(),
            None => url.to_string(),
        },
    }
}

/// A stored response. Every read hands out a fresh, unread [`Response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub response_type: ResponseType,
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl CachedResponse {
    /// Capture a response, consuming its body
    pub fn capture(mut response: Response) -> Result<Self, CacheError> {
        let body = response.bytes()?;
        Ok(Self {
            response_type: response.response_type,
            url: response.url,
            status: response.status,
            status_text: response.status_text,
            headers: response.headers,
            body,
        })
    }

    /// Rebuild a readable response
    pub fn to_response(&self) -> Response {
        let mut response = Response::new(self.status)
            .with_type(self.response_type)
            .with_url(self.url.clone())
            .with_body(self.body.clone());
        response.status_text = self.status_text.clone();
        response.headers = self.headers.clone();
        response
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.body.len()
            + self
                .headers
                .iter()
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>()
    }
}

/// Versioned response store
///
/// Implementations must make each single-key write atomic; concurrent
/// writers to the same key resolve as last write wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open a cache, creating it if missing
    async fn open(&self, name: &str) -> Result<(), CacheError>;

    /// Check if a cache exists
    async fn has(&self, name: &str) -> Result<bool, CacheError>;

    /// Delete a cache; `Ok(false)` if it did not exist
    async fn delete(&self, name: &str) -> Result<bool, CacheError>;

    /// All cache names
    async fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Look a request up in one cache
    async fn match_request(
        &self,
        name: &str,
        request: &Request,
    ) -> Result<Option<Response>, CacheError>;

    /// Look a request up across every cache
    async fn match_any(&self, request: &Request) -> Result<Option<Response>, CacheError>;

    /// Store a response, creating the cache if missing
    async fn put(&self, name: &str, request: &Request, response: Response)
        -> Result<(), CacheError>;

    /// Store every response or none of them
    async fn put_all(
        &self,
        name: &str,
        entries: Vec<(Request, Response)>,
    ) -> Result<(), CacheError>;
}

/// A cached request-response pair
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Request URL
    url: String,
    /// Stored response
    response: CachedResponse,
}

/// A named cache
#[derive(Debug, Clone, Default)]
pub struct NamedCache {
    /// Cached entries (key -> entry)
    entries: BTreeMap<String, CacheEntry>,
    /// Total size in bytes
    total_size: usize,
}

impl NamedCache {
    /// Match a request
    pub fn match_request(&self, request: &Request) -> Option<Response> {
        self.entries
            .get(&cache_key(request))
            .map(|e| e.response.to_response())
    }

    /// Insert, replacing any previous entry for the same key.
    /// Returns the size delta.
    fn insert(&mut self, request: &Request, response: CachedResponse) -> isize {
        let size = response.size();
        let entry = CacheEntry {
            url: request.url.clone(),
            response,
        };
        let old = self
            .entries
            .insert(cache_key(request), entry)
            .map(|e| e.response.size())
            .unwrap_or(0);
        self.total_size = self.total_size + size - old;
        size as isize - old as isize
    }

    /// URLs of all entries
    pub fn urls(&self) -> Vec<String> {
        self.entries.values().map(|e| e.url.clone()).collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get total size
    pub fn size(&self) -> usize {
        self.total_size
    }
}

/// In-memory cache store
pub struct MemoryCacheStore {
    /// Caches by name
    caches: RwLock<BTreeMap<String, NamedCache>>,
    /// Quota (bytes)
    quota: usize,
}

impl MemoryCacheStore {
    /// Create a store with the default quota
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_QUOTA)
    }

    /// Create a store with a custom quota
    pub fn with_quota(quota: usize) -> Self {
        Self {
            caches: RwLock::new(BTreeMap::new()),
            quota,
        }
    }

    /// Get quota
    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Get usage
    pub fn usage(&self) -> usize {
        usage_of(&self.caches.read())
    }

    /// Snapshot of one cache
    pub fn snapshot(&self, name: &str) -> Option<NamedCache> {
        self.caches.read().get(name).cloned()
    }

    fn check_quota(&self, usage: usize, delta: isize) -> Result<(), CacheError> {
        if delta <= 0 {
            return Ok(());
        }
        let needed = delta as usize;
        let available = self.quota.saturating_sub(usage);
        if needed > available {
            return Err(CacheError::QuotaExceeded { needed, available });
        }
        Ok(())
    }
}

fn usage_of(caches: &BTreeMap<String, NamedCache>) -> usize {
    caches.values().map(|c| c.size()).sum()
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        self.caches.write().entry(name.to_string()).or_default();
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.caches.read().contains_key(name))
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.caches.write().remove(name).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.caches.read().keys().cloned().collect())
    }

    async fn match_request(
        &self,
        name: &str,
        request: &Request,
    ) -> Result<Option<Response>, CacheError> {
        Ok(self
            .caches
            .read()
            .get(name)
            .and_then(|cache| cache.match_request(request)))
    }

    async fn match_any(&self, request: &Request) -> Result<Option<Response>, CacheError> {
        Ok(self
            .caches
            .read()
            .values()
            .find_map(|cache| cache.match_request(request)))
    }

    async fn put(
        &self,
        name: &str,
        request: &Request,
        response: Response,
    ) -> Result<(), CacheError> {
        let captured = CachedResponse::capture(response)?;

        let mut caches = self.caches.write();
        let usage = usage_of(&caches);
        let replaced = caches
            .get(name)
            .and_then(|cache| cache.entries.get(&cache_key(request)))
            .map(|e| e.response.size())
            .unwrap_or(0);
        self.check_quota(usage, captured.size() as isize - replaced as isize)?;

        caches
            .entry(name.to_string())
            .or_default()
            .insert(request, captured);
        Ok(())
    }

    async fn put_all(
        &self,
        name: &str,
        entries: Vec<(Request, Response)>,
    ) -> Result<(), CacheError> {
        let mut captured = Vec::with_capacity(entries.len());
        for (request, response) in entries {
            captured.push((request, CachedResponse::capture(response)?));
        }

        let mut caches = self.caches.write();
        let usage = usage_of(&caches);
        let mut candidate = caches.get(name).cloned().unwrap_or_default();
        let delta: isize = captured
            .into_iter()
            .map(|(request, response)| candidate.insert(&request, response))
            .sum();
        self.check_quota(usage, delta)?;
        caches.insert(name.to_string(), candidate);
        Ok(())
    }
}
