//! Fetch Event Handling
//!
//! Request / response model seen by the worker, and the fetch event the
//! platform dispatches for every request a controlled page makes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{BodyUsedError, EventLifetime, EventType, ExtendableEvent};

/// Fetch event ID counter
static NEXT_FETCH_ID: AtomicU64 = AtomicU64::new(1);

/// Fetch event ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchEventId(u64);

impl FetchEventId {
    /// Create a new ID
    pub fn new() -> Self {
        Self(NEXT_FETCH_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for FetchEventId {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl RequestMethod {
    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

/// Request mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Same-origin only
    SameOrigin,
    /// No CORS
    NoCors,
    /// CORS
    #[default]
    Cors,
    /// Top-level page navigation
    Navigate,
}

/// Request cache mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestCache {
    /// Default HTTP cache behavior
    #[default]
    Default,
    /// Skip the HTTP cache on the way out, refresh it with the result
    Reload,
    /// Revalidate with the server before using a cached copy
    NoCache,
    /// Bypass the HTTP cache entirely
    NoStore,
}

/// Fetch request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request URL (absolute, or path relative to the worker origin)
    pub url: String,
    /// HTTP method
    pub method: RequestMethod,
    /// Request headers
    pub headers: BTreeMap<String, String>,
    /// Request mode
    pub mode: RequestMode,
    /// Cache mode
    pub cache: RequestCache,
}

impl Request {
    /// Create a new GET request
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: RequestMethod::Get,
            headers: BTreeMap::new(),
            mode: RequestMode::Cors,
            cache: RequestCache::Default,
        }
    }

    /// Create a top-level navigation request
    pub fn navigate(url: impl Into<String>) -> Self {
        Self::new(url).with_mode(RequestMode::Navigate)
    }

    /// Set the method
    pub fn with_method(mut self, method: RequestMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the mode
    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the cache mode
    pub fn with_cache(mut self, cache: RequestCache) -> Self {
        self.cache = cache;
        self
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Whether this is a full-page navigation
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// Response type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// Same-origin response
    Basic,
    /// Cross-origin response with CORS
    Cors,
    #[default]
    Default,
    /// Network error placeholder
    Error,
    /// Cross-origin response without CORS
    Opaque,
}

/// Fetch response
///
/// The body can be read once. A response that has to reach two consumers
/// (the page and the cache) is split with [`Response::duplicate`] before
/// either one reads it.
#[derive(Debug, PartialEq, Eq)]
pub struct Response {
    /// Response type
    pub response_type: ResponseType,
    /// Final URL
    pub url: String,
    /// Status code
    pub status: u16,
    /// Status text
    pub status_text: String,
    /// Response headers
    pub headers: BTreeMap<String, String>,
    /// Response body
    body: Option<Vec<u8>>,
    /// Whether body was used
    body_used: bool,
}

impl Response {
    /// Create a new response
    pub fn new(status: u16) -> Self {
        Self {
            response_type: ResponseType::Default,
            url: String::new(),
            status,
            status_text: status_text_for(status).to_string(),
            headers: BTreeMap::new(),
            body: None,
            body_used: false,
        }
    }

    /// Create error response
    pub fn error() -> Self {
        Self {
            response_type: ResponseType::Error,
            status: 0,
            status_text: String::new(),
            ..Self::new(0)
        }
    }

    /// Create a plain-text response
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("Content-Type", "text/plain")
            .with_body(body.into().into_bytes())
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self.body_used = false;
        self
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the final URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the response type
    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Check if response is OK
    pub fn ok(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Whether the runtime cache may store this response.
    ///
    /// Only complete `200` responses are kept; partial content, redirects and
    /// network-error placeholders are passed through uncached.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.response_type != ResponseType::Error
    }

    /// Check whether the body has been consumed
    pub fn body_used(&self) -> bool {
        self.body_used
    }

    /// Header lookup, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Duplicate into an independently readable copy.
    ///
    /// Fails once the body has been read.
    pub fn duplicate(&self) -> Result<Response, BodyUsedError> {
        if self.body_used {
            return Err(BodyUsedError);
        }
        Ok(Self {
            response_type: self.response_type,
            url: self.url.clone(),
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            body_used: false,
        })
    }

    /// Consume the body as bytes
    pub fn bytes(&mut self) -> Result<Vec<u8>, BodyUsedError> {
        if self.body_used {
            return Err(BodyUsedError);
        }
        self.body_used = true;
        Ok(self.body.take().unwrap_or_default())
    }

    /// Consume the body as UTF-8 text (lossy)
    pub fn text_body(&mut self) -> Result<String, BodyUsedError> {
        self.bytes()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Get status text for status code
fn status_text_for(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

/// Fetch event
#[derive(Debug)]
pub struct FetchEvent {
    /// Event ID
    id: FetchEventId,
    /// Request
    request: Request,
    /// Response (if respond_with was called)
    response: Option<Response>,
    /// Whether respond_with was called
    responded: bool,
    /// Lifetime extension
    lifetime: EventLifetime,
}

impl FetchEvent {
    /// Create a new fetch event
    pub fn new(request: Request) -> Self {
        Self {
            id: FetchEventId::new(),
            request,
            response: None,
            responded: false,
            lifetime: EventLifetime::new(),
        }
    }

    /// Get the event ID
    pub fn id(&self) -> FetchEventId {
        self.id
    }

    /// Get the request
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Check if respond_with was called
    pub fn responded(&self) -> bool {
        self.responded
    }

    /// Respond with a response. Only the first call takes effect.
    pub fn respond_with(&mut self, response: Response) {
        if !self.responded {
            self.responded = true;
            self.response = Some(response);
        }
    }

    /// Take the response
    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }
}

impl ExtendableEvent for FetchEvent {
    fn event_type(&self) -> EventType {
        EventType::Fetch
    }

    fn lifetime(&self) -> &EventLifetime {
        &self.lifetime
    }

    fn lifetime_mut(&mut self) -> &mut EventLifetime {
        &mut self.lifetime
    }
}
