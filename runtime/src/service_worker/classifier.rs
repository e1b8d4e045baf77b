//! Request classification
//!
//! Decides, per request, whether the worker may touch the cache at all.
//! Rules are evaluated in order and the first match wins:
//!
//! 1. anything but `GET` bypasses
//! 2. paths matching a no-cache pattern bypass (auth, payment, checkout, API)
//! 3. cross-origin requests bypass unless the host is a trusted CDN
//! 4. everything else is runtime-cacheable

use std::collections::BTreeSet;

use regex::RegexSet;
use url::{Origin, Url};

use super::{ConfigError, Request, RequestMethod, WorkerConfig};

/// Classification result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Part of the static asset manifest, stored at install
    Precache,
    /// Never read from or written to the cache
    Bypass(BypassReason),
    /// Cache-first, populated on first successful fetch
    RuntimeCacheable,
}

/// Why a request bypasses the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    /// Not a plain GET
    Method,
    /// Path matches a no-cache pattern
    NoCachePattern,
    /// Foreign origin that is not a trusted CDN
    CrossOrigin,
    /// URL could not be parsed
    InvalidUrl,
}

/// Request classifier
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    /// Worker origin, also the base for relative URLs
    base: Url,
    /// Worker origin
    origin: Origin,
    /// Compiled no-cache patterns
    no_cache: RegexSet,
    /// Trusted CDN hosts (lowercase)
    trusted_cdn_hosts: Vec<String>,
    /// Static asset manifest
    static_assets: BTreeSet<String>,
}

impl RequestClassifier {
    /// Build a classifier from the worker configuration
    pub fn new(config: &WorkerConfig) -> Result<Self, ConfigError> {
        let base = config.origin_url()?;
        let no_cache = RegexSet::new(&config.no_cache_patterns).map_err(|source| {
            ConfigError::Pattern {
                pattern: config.no_cache_patterns.join(" | "),
                source,
            }
        })?;

        Ok(Self {
            origin: base.origin(),
            base,
            no_cache,
            trusted_cdn_hosts: config
                .trusted_cdn_hosts
                .iter()
                .map(|h| h.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            static_assets: config.static_assets.iter().cloned().collect(),
        })
    }

    /// Classify a request. Never returns [`RequestClass::Precache`]; use
    /// [`is_precached`](Self::is_precached) for manifest membership.
    pub fn classify(&self, request: &Request) -> RequestClass {
        if request.method != RequestMethod::Get {
            return RequestClass::Bypass(BypassReason::Method);
        }

        let url = match self.resolve(&request.url) {
            Some(url) => url,
            None => return RequestClass::Bypass(BypassReason::InvalidUrl),
        };

        if self.no_cache.is_match(url.path()) {
            return RequestClass::Bypass(BypassReason::NoCachePattern);
        }

        if url.origin() != self.origin && !url.host_str().is_some_and(|h| self.is_trusted_cdn(h)) {
            return RequestClass::Bypass(BypassReason::CrossOrigin);
        }

        RequestClass::RuntimeCacheable
    }

    /// Whether the path is part of the static asset manifest
    pub fn is_precached(&self, path: &str) -> bool {
        self.static_assets.contains(path)
    }

    /// Whether the host is an allow-listed CDN host or one of its subdomains
    pub fn is_trusted_cdn(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.trusted_cdn_hosts.iter().any(|trusted| {
            host.strip_suffix(trusted.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.ends_with('.'))
        })
    }

    /// The request with its URL resolved against the worker origin, in
    /// the canonical form the cache stores it under; `None` if the URL does
    /// not parse.
    pub fn resolve_request(&self, request: &Request) -> Option<Request> {
        let mut url = self.resolve(&request.url)?;
        url.set_fragment(None);
        let mut resolved = request.clone();
        resolved.url = url.into();
        Some(resolved)
    }

    fn resolve(&self, url: &str) -> Option<Url> {
        Url::options().base_url(Some(&self.base)).parse(url).ok()
    }
}
