//! Cache Manager
//!
//! The worker's state machine. Install pre-caches the app shell into the
//! current versioned cache, activate evicts every other cache and claims the
//! open pages, and fetch serves cacheable requests cache-first with offline
//! fallbacks.

use std::sync::Arc;

use spin::Mutex;
use tokio::task::JoinHandle;

use super::{
    ActivateReport, CacheError, CacheStore, Clients, ConfigError, EventLifetime, InstallReport,
    Lifecycle, LifecycleEvent, Network, NetworkError, Request, RequestCache, RequestClass,
    RequestClassifier, Response, WorkerConfig, WorkerError, WorkerState,
};

/// Status of the synthesized offline response
pub const OFFLINE_STATUS: u16 = 408;

/// Body of the synthesized offline response
pub const OFFLINE_BODY: &str = "Network error happened";

/// Where a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    /// The current named cache
    Cache,
    /// The network
    Network,
    /// The cached offline page, for a failed navigation
    OfflinePage,
    /// Synthesized offline response
    Synthesized,
}

/// Result of intercepting a fetch
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not intercepted; the platform performs its default fetch
    Passthrough,
    /// Answered by the worker
    Respond(Response, FetchSource),
}

impl FetchOutcome {
    /// Source of the response, if the worker answered
    pub fn source(&self) -> Option<FetchSource> {
        match self {
            FetchOutcome::Passthrough => None,
            FetchOutcome::Respond(_, source) => Some(*source),
        }
    }

    /// Take the response, if the worker answered
    pub fn into_response(self) -> Option<Response> {
        match self {
            FetchOutcome::Passthrough => None,
            FetchOutcome::Respond(response, _) => Some(response),
        }
    }
}

/// Cache manager for one worker instance
pub struct CacheManager {
    /// Immutable configuration
    config: Arc<WorkerConfig>,
    /// Request classifier built from the configuration
    classifier: RequestClassifier,
    /// Response store
    store: Arc<dyn CacheStore>,
    /// Platform network
    network: Arc<dyn Network>,
    /// Pages in scope
    clients: Arc<dyn Clients>,
    /// Lifecycle state
    lifecycle: Mutex<Lifecycle>,
}

impl CacheManager {
    /// Create a manager
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn CacheStore>,
        network: Arc<dyn Network>,
        clients: Arc<dyn Clients>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let classifier = RequestClassifier::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            classifier,
            store,
            network,
            clients,
            lifecycle: Mutex::new(Lifecycle::new()),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Get the classifier
    pub fn classifier(&self) -> &RequestClassifier {
        &self.classifier
    }

    /// Get the store
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Get the clients handle
    pub fn clients(&self) -> &Arc<dyn Clients> {
        &self.clients
    }

    /// Name of the authoritative cache
    pub fn cache_name(&self) -> String {
        self.config.cache_name()
    }

    /// Current state
    pub fn state(&self) -> WorkerState {
        self.lifecycle.lock().state()
    }

    /// Take lifecycle events recorded since the last call
    pub fn drain_events(&self) -> Vec<LifecycleEvent> {
        self.lifecycle.lock().drain_events()
    }

    fn transition(&self, to: WorkerState) -> Result<(), WorkerError> {
        self.lifecycle.lock().transition(to)
    }

    fn record(&self, event: LifecycleEvent) {
        self.lifecycle.lock().record(event);
    }

    /// Install: pre-cache the static asset manifest.
    ///
    /// A failed pre-cache is logged and reported, but the worker still moves
    /// on to `Waiting`; the page keeps working without the app shell cached.
    /// Ends by requesting skip-waiting, unless disabled in the configuration,
    /// so a fresh deploy takes over without waiting for old pages to close.
    /// A skip-waiting request that arrived while installing is honoured
    /// either way.
    pub async fn install(&self) -> Result<InstallReport, WorkerError> {
        self.transition(WorkerState::Installing)?;
        let cache_name = self.cache_name();
        log::info!("[SW] Install event, caching static assets into {}", cache_name);

        let report = match self.precache(&cache_name).await {
            Ok(cached) => InstallReport {
                cache_name,
                cached,
                error: None,
            },
            Err(e) => {
                log::error!("[SW] Failed to cache static assets: {}", e);
                InstallReport {
                    cache_name,
                    cached: 0,
                    error: Some(e),
                }
            }
        };

        self.transition(WorkerState::Waiting)?;
        let requested = self.lifecycle.lock().skip_waiting_requested();
        if self.config.skip_waiting_on_install || requested {
            self.skip_waiting()?;
        }
        Ok(report)
    }

    /// Fetch every manifest entry bypassing intermediate HTTP caches, then
    /// store them all at once.
    async fn precache(&self, cache_name: &str) -> Result<usize, WorkerError> {
        self.store.open(cache_name).await?;

        let requests = self
            .config
            .static_assets
            .iter()
            .map(|path| {
                self.classifier
                    .resolve_request(&Request::new(path.as_str()))
                    .map(|request| request.with_cache(RequestCache::Reload))
                    .ok_or_else(|| NetworkError::InvalidUrl(path.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let fetches = requests.into_iter().map(|request| async move {
            let response = self.network.fetch(request.clone()).await?;
            if !response.ok() {
                return Err(NetworkError::BadStatus {
                    url: request.url,
                    status: response.status,
                });
            }
            Ok((request, response))
        });

        let entries = futures::future::try_join_all(fetches).await?;
        let count = entries.len();
        self.store.put_all(cache_name, entries).await?;
        Ok(count)
    }

    /// Request skip-waiting; returns `true` if the worker left `Waiting`
    pub fn skip_waiting(&self) -> Result<bool, WorkerError> {
        let mut lifecycle = self.lifecycle.lock();
        log::debug!("[SW] Skip waiting requested in state {}", lifecycle.state());
        lifecycle.skip_waiting()
    }

    /// Activate: evict stale caches, then claim open pages.
    ///
    /// Eviction is awaited in full before the worker counts as active. A
    /// cache that fails to delete does not block activation; it is reported
    /// and, being stale, is retried on the next activation.
    pub async fn activate(&self) -> Result<ActivateReport, WorkerError> {
        if self.state() == WorkerState::Waiting {
            self.transition(WorkerState::Activating)?;
        }
        if self.state() != WorkerState::Activating {
            return Err(WorkerError::InvalidStateTransition {
                from: self.state(),
                to: WorkerState::Activating,
            });
        }
        log::info!("[SW] Activate event");

        let mut report = self.evict_stale().await;

        self.transition(WorkerState::Active)?;
        report.claimed = self.claim().await;
        Ok(report)
    }

    async fn evict_stale(&self) -> ActivateReport {
        let current = self.cache_name();
        let names = match self.store.keys().await {
            Ok(names) => names,
            Err(e) => {
                log::warn!("[SW] Could not list caches, skipping eviction: {}", e);
                return ActivateReport::default();
            }
        };

        let stale: Vec<String> = names.into_iter().filter(|n| *n != current).collect();
        let deletions = stale.iter().map(|name| async move {
            log::info!("[SW] Deleting old cache: {}", name);
            (name.clone(), self.store.delete(name).await)
        });

        let mut report = ActivateReport::default();
        for (name, result) in futures::future::join_all(deletions).await {
            match result {
                Ok(_) => {
                    self.record(LifecycleEvent::CacheEvicted(name.clone()));
                    report.evicted.push(name);
                }
                Err(e) => {
                    log::warn!("[SW] Failed to delete old cache {}: {}", name, e);
                    report.failed.push(name);
                }
            }
        }
        report
    }

    async fn claim(&self) -> bool {
        match self.clients.claim().await {
            Ok(()) => {
                self.record(LifecycleEvent::ControllerChange);
                true
            }
            Err(e) => {
                log::warn!("[SW] Failed to claim clients: {}", e);
                false
            }
        }
    }

    /// Delete every cache, all versions. Does not repopulate.
    pub async fn clear_all(&self) -> Result<usize, CacheError> {
        let names = self.store.keys().await?;
        let mut deleted = 0;
        for name in &names {
            if self.store.delete(name).await? {
                deleted += 1;
            }
        }
        log::info!("[SW] Cleared {} caches", deleted);
        self.record(LifecycleEvent::CachesCleared(deleted));
        Ok(deleted)
    }

    /// Intercept a fetch.
    ///
    /// The cache lookup always precedes the network: a request already in
    /// the cache never reaches the network. Successful network responses are
    /// duplicated; one copy is written back by a task tied to `lifetime`,
    /// the other is returned right away.
    ///
    /// Relative and differently spelled URLs are resolved against the worker
    /// origin first, so they share cache entries with their canonical form.
    ///
    /// Must be called within a Tokio runtime: the cache write is spawned
    /// onto it.
    pub async fn fetch(&self, request: &Request, lifetime: &mut EventLifetime) -> FetchOutcome {
        let state = self.state();
        if !state.can_intercept_fetch() {
            log::debug!("[SW] Not intercepting {} while {}", request.url, state);
            return FetchOutcome::Passthrough;
        }

        if let RequestClass::Bypass(reason) = self.classifier.classify(request) {
            log::debug!("[SW] Bypassing {} ({:?})", request.url, reason);
            return FetchOutcome::Passthrough;
        }
        // Classification already parsed the URL
        let Some(request) = self.classifier.resolve_request(request) else {
            return FetchOutcome::Passthrough;
        };
        let request = &request;

        let cache_name = self.cache_name();
        match self.store.match_request(&cache_name, request).await {
            Ok(Some(cached)) => {
                log::debug!("[SW] Serving from cache: {}", request.url);
                return FetchOutcome::Respond(cached, FetchSource::Cache);
            }
            Ok(None) => {
                if self.is_app_shell(request) {
                    log::debug!("[SW] App shell asset missing from cache: {}", request.url);
                }
            }
            Err(e) => log::debug!("[SW] Cache lookup for {} failed: {}", request.url, e),
        }

        match self.network.fetch(request.clone()).await {
            Ok(response) => {
                if response.is_cacheable() {
                    match response.duplicate() {
                        Ok(copy) => lifetime.wait_until(self.spawn_cache_write(
                            cache_name,
                            request.clone(),
                            copy,
                        )),
                        Err(e) => log::debug!("[SW] Not caching {}: {}", request.url, e),
                    }
                }
                FetchOutcome::Respond(response, FetchSource::Network)
            }
            Err(e) => {
                log::error!("[SW] Fetch failed: {}: {}", request.url, e);
                self.offline_response(request).await
            }
        }
    }

    fn is_app_shell(&self, request: &Request) -> bool {
        url::Url::parse(&request.url)
            .is_ok_and(|url| self.classifier.is_precached(url.path()))
    }

    fn spawn_cache_write(
        &self,
        cache_name: String,
        request: Request,
        response: Response,
    ) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            match store.put(&cache_name, &request, response).await {
                Ok(()) => log::debug!("[SW] Caching new resource: {}", request.url),
                Err(e) => log::debug!("[SW] Dropped cache write for {}: {}", request.url, e),
            }
        })
    }

    async fn offline_response(&self, request: &Request) -> FetchOutcome {
        if request.is_navigation() {
            let offline = Request::new(self.config.offline_page.as_str());
            match self.classifier.resolve_request(&offline) {
                Some(offline) => match self.store.match_any(&offline).await {
                    Ok(Some(page)) => {
                        return FetchOutcome::Respond(page, FetchSource::OfflinePage)
                    }
                    Ok(None) => log::warn!("[SW] Offline page missing from cache"),
                    Err(e) => log::warn!("[SW] Offline page lookup failed: {}", e),
                },
                None => log::warn!("[SW] Offline page path does not resolve"),
            }
        }
        FetchOutcome::Respond(
            Response::text(OFFLINE_STATUS, OFFLINE_BODY),
            FetchSource::Synthesized,
        )
    }
}
