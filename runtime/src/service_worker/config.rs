//! Worker configuration
//!
//! The worker's configuration is fixed for the lifetime of an instance and
//! injected at construction. Bumping `cache_version` invalidates every cache
//! written by an earlier deploy on the next activation.

use serde::{Deserialize, Serialize};
use url::Url;

use super::{ConfigError, NotificationConfig};

/// Default cache version
pub const CACHE_VERSION: &str = "v1.0.0";

/// Default cache name prefix
pub const APP_PREFIX: &str = "gee-ess-opticals";

/// App shell, pre-cached at install
pub const STATIC_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/offline.html",
    "/static/css/main.css",
    "/static/js/main.js",
    "/static/js/bundle.js",
    "/manifest.json",
];

/// Routes expected to be visited early; warmed by the runtime cache
pub const RUNTIME_CACHE_ROUTES: &[&str] = &["/products", "/cart", "/orders", "/profile", "/wishlist"];

/// Paths that are never read from or written to the cache
pub const NO_CACHE_PATTERNS: &[&str] = &[r"/api/", r"/auth/", r"/payment/", r"/checkout/"];

/// Cross-origin hosts whose responses may be cached
pub const TRUSTED_CDN_HOSTS: &[&str] = &["cdn.jsdelivr.net", "cdnjs.cloudflare.com", "unpkg.com"];

/// Worker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Application prefix of every cache name
    pub app_prefix: String,
    /// Current cache version
    pub cache_version: String,
    /// Origin the worker is served from
    pub origin: String,
    /// Paths pre-cached at install, in order
    pub static_assets: Vec<String>,
    /// Advisory list of routes warmed at runtime
    pub runtime_cache_routes: Vec<String>,
    /// Path regexes that bypass the cache
    pub no_cache_patterns: Vec<String>,
    /// Cross-origin hosts allowed into the runtime cache (subdomains included)
    pub trusted_cdn_hosts: Vec<String>,
    /// Document served to failed navigations
    pub offline_page: String,
    /// Leave `Waiting` as soon as install finishes instead of waiting for a
    /// `SKIP_WAITING` message
    pub skip_waiting_on_install: bool,
    /// Push notification appearance
    pub notification: NotificationConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            app_prefix: APP_PREFIX.to_string(),
            cache_version: CACHE_VERSION.to_string(),
            origin: "http://localhost:3000".to_string(),
            static_assets: to_strings(STATIC_ASSETS),
            runtime_cache_routes: to_strings(RUNTIME_CACHE_ROUTES),
            no_cache_patterns: to_strings(NO_CACHE_PATTERNS),
            trusted_cdn_hosts: to_strings(TRUSTED_CDN_HOSTS),
            offline_page: "/offline.html".to_string(),
            skip_waiting_on_install: true,
            notification: NotificationConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Default configuration served from `origin`
    pub fn for_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            ..Self::default()
        }
    }

    /// Load a configuration from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the worker cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_version.trim().is_empty() {
            return Err(ConfigError::EmptyVersion);
        }
        self.origin_url()?;
        for pattern in &self.no_cache_patterns {
            regex::Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
        }
        if !self.static_assets.contains(&self.offline_page) {
            return Err(ConfigError::OfflinePageNotPrecached(
                self.offline_page.clone(),
            ));
        }
        Ok(())
    }

    /// Name of the cache authoritative for this version
    pub fn cache_name(&self) -> String {
        format!("{}-{}", self.app_prefix, self.cache_version)
    }

    /// Parsed origin
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url =
            Url::parse(&self.origin).map_err(|_| ConfigError::InvalidOrigin(self.origin.clone()))?;
        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(url),
            _ => Err(ConfigError::InvalidOrigin(self.origin.clone())),
        }
    }

    /// Absolute URL of a path on the worker's origin
    pub fn absolute_url(&self, path: &str) -> String {
        match self.origin_url().and_then(|base| {
            base.join(path)
                .map_err(|_| ConfigError::InvalidOrigin(self.origin.clone()))
        }) {
            Ok(url) => url.to_string(),
            Err(_) => path.to_string(),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
